//! Transcript grouping (sub-agent span detection over a message log).

pub mod group;

pub use group::{
    classify_subagent_child, group_messages, subagent_group_exists, MessageGroup, SubagentDisplay,
};
