//! Progress bar wiring for the command-line interface.

use indicatif::{ProgressBar, ProgressStyle};

use crate::ebg::ProgressFn;

/// Adapts an indicatif bar onto the expander's progress callback. Both
/// generation phases tick through the node range, so the bar simply
/// follows the latest position.
pub fn expansion_progress(total_nodes: u64) -> Box<ProgressFn> {
    let bar = ProgressBar::new(total_nodes);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} nodes ({percent}%)")
            .expect("valid progress template")
            .progress_chars("#>-"),
    );
    Box::new(move |done, _total| {
        bar.set_position(done);
    })
}
