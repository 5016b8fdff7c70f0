#![warn(clippy::uninlined_format_args)]

pub mod tables;

pub use tables::{
    LoadError, open_table, read_assignment, read_author_countries, read_bids,
    read_declared_conflicts, read_papers, read_reviewers, read_scores, read_topics,
    write_assignment, write_scores,
};
