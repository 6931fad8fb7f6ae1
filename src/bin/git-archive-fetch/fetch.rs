use indicatif::{MultiProgress, ProgressBar};

use git_archive::{Cache, Input, Registry, Store, Tree};

use crate::progress::{complete_progress_spinner, make_progress_spinner};

pub type FetchResult = Result<(Tree, Input), git_archive::Error>;

// Fetch a single input, reporting progress in the provided progress bar
fn fetch_one(
    registry: &Registry,
    store: &dyn Store,
    cache: &dyn Cache,
    input: &Input,
    bar: ProgressBar,
) -> FetchResult {
    bar.set_message(input.to_string());
    let result = registry.fetch(store, cache, input);
    match &result {
        Ok((tree, locked)) => complete_progress_spinner(
            bar,
            format!("😸 {locked} -> {}", tree.actual_path.display()),
            true,
        ),
        Err(err) => complete_progress_spinner(bar, format!("😿 failed to fetch '{input}': {err}"), false),
    }
    result
}

// Fetch inputs in parallel with `rayon`, pairing each input with its own progress bar. Creating
// the bars up front means they are shown in input order.
pub fn parallel_fetch(
    registry: &Registry,
    store: &dyn Store,
    cache: &dyn Cache,
    inputs: &[Input],
) -> Vec<FetchResult> {
    use rayon::prelude::*;
    let count = inputs.len();
    let mp = MultiProgress::new();
    let ordered_bars = (0..count)
        .map(|k| make_progress_spinner(&mp, format!("[{}/{count}]", k + 1)))
        .collect::<Vec<_>>();
    ordered_bars
        .into_par_iter()
        .zip(inputs.par_iter())
        .map(|(bar, input)| fetch_one(registry, store, cache, input, bar))
        .collect()
}
