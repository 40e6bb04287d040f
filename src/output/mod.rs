pub mod formatter;

pub use formatter::{
    format_breakdown, format_report, format_score, format_scored_table, format_tsv,
    format_weights, should_use_colors,
};
