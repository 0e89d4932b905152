// Host-facing lifecycle around the fetch pipeline: an explicit loader with
// start/result/reset hooks, and a row-binding trait for list presentation.

use crate::usgs_api_models::{Earthquake, FeedParams, UsgsModels};

/// Runs one fetch-parse cycle per `start` and holds the delivered batch until
/// the next `start` or a `reset`. Each delivery wholly replaces the previous
/// batch; nothing is merged. Callers dispatch `start` off the interactive
/// thread (the server wraps it in `spawn_blocking`).
pub struct EarthquakeLoader {
    base_url: String,
    result: Option<Vec<Earthquake>>,
}

impl EarthquakeLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        EarthquakeLoader {
            base_url: base_url.into(),
            result: None,
        }
    }

    /// Build the query URL from the caller's parameters and run the pipeline
    /// to completion. Failures have already been absorbed downstream, so the
    /// delivered batch is at worst empty.
    pub fn start(&mut self, params: &FeedParams) -> &[Earthquake] {
        let quakes = match UsgsModels::build_query_url(&self.base_url, params) {
            Ok(url) => UsgsModels::fetch_earthquake_data(&url),
            Err(e) => {
                eprintln!("⚠️  {}", e);
                Vec::new()
            }
        };

        self.result = Some(quakes);
        self.result.as_deref().unwrap_or(&[])
    }

    /// The last delivered batch, if any start has completed since the last
    /// reset.
    pub fn result(&self) -> Option<&[Earthquake]> {
        self.result.as_deref()
    }

    pub fn reset(&mut self) {
        self.result = None;
    }
}

/// Render one record at a list position, optionally reusing a handle left
/// behind by a row that scrolled out of view. Any presentation layer can
/// satisfy this; the recycled handle is a hint, not an obligation.
pub trait RowBinder {
    type Handle;

    fn bind(&self, position: usize, quake: &Earthquake, recycled: Option<Self::Handle>)
        -> Self::Handle;
}

/// Bind a whole batch, feeding handles from `pool` back through the binder
/// until the pool runs dry.
pub fn bind_rows<B: RowBinder>(
    binder: &B,
    quakes: &[Earthquake],
    mut pool: Vec<B::Handle>,
) -> Vec<B::Handle> {
    let mut bound = Vec::with_capacity(quakes.len());

    for (position, quake) in quakes.iter().enumerate() {
        let recycled = pool.pop();
        bound.push(binder.bind(position, quake, recycled));
    }

    bound
}
