//! # lodestone-policy: Policy document parsing
//!
//! Parses the line-oriented, section-delimited policy file format into an
//! in-memory [`PolicyDocument`]:
//!
//! ```text
//! [groups]
//! admin = all_server
//! user_group1 = select_tbl1
//! [roles]
//! all_server = server=server1
//! select_tbl1 = server=server1->db=db1->table=tbl1->action=select
//! [users]
//! user_1 = user_group1
//! [databases]
//! db2 = /etc/lodestone/db2-policy.ini
//! ```
//!
//! Privilege strings are parsed into structured [`lodestone_types::Privilege`]
//! values while the document loads, so a malformed privilege fails the load
//! instead of a live authorization request.

pub mod document;
pub mod parser;

pub use document::PolicyDocument;
pub use parser::{PolicyError, PolicyParser};
