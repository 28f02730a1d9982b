//! Sweep progress bar, drawn by `tracing-indicatif` on the sweep span.

use std::sync::Arc;

use indicatif::ProgressStyle;
use sweepr_core::sweep::{ProgressSink, SweepProgress};
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;

const BAR_TEMPLATE: &str = "{spinner:.blue} sweeping [{bar:32.green/bright_black}] {pos}/{len} ({elapsed})";

pub fn prepare(span: &Span, total: u64) -> anyhow::Result<()> {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)?
        .progress_chars("█▓░")
        .tick_strings(&[
            "▁▁▁▁▁",
            "▁▂▂▂▁",
            "▁▄▂▄▁",
            "▂▄▆▄▂",
            "▄▆█▆▄",
            "▂▄▆▄▂",
            "▁▄▂▄▁",
            "▁▂▂▂▁",
        ]);
    span.pb_set_style(&style);
    span.pb_set_length(total);
    span.pb_set_position(0);
    Ok(())
}

/// Moves the bar as echo probes complete.
pub fn sink(span: Span) -> ProgressSink {
    Arc::new(move |progress: SweepProgress| {
        span.pb_set_position(progress.completed);
    })
}
