use crate::fetcher::{FetchError, ViewSource};
use crate::field_guide::AllowList;
use crate::io_struct::{AskResponse, DescriptorError, FlatRecord, StructuredReply, ViewDescriptor};
use futures::future::join_all;
use log::warn;

enum ViewResult {
    Fetched {
        view: String,
        result: Result<Vec<FlatRecord>, FetchError>,
    },
    Malformed {
        index: usize,
        error: DescriptorError,
    },
}

/// Fans a structured reply out to its views and folds the results into one payload.
pub struct ResponseAggregator<S> {
    source: S,
    allow_list: AllowList,
}

impl<S: ViewSource> ResponseAggregator<S> {
    pub fn new(source: S, allow_list: AllowList) -> Self {
        Self { source, allow_list }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetches run concurrently; results are merged in descriptor order, so a repeated
    /// view name keeps the last descriptor's rows.
    pub async fn aggregate(&self, reply: StructuredReply) -> AskResponse {
        let StructuredReply {
            views,
            interpretation,
            suggestion,
        } = reply;

        let tasks = views.iter().enumerate().map(|(index, raw)| async move {
            match ViewDescriptor::try_from(raw) {
                Ok(descriptor) => {
                    if !self.allow_list.permits(&descriptor) {
                        warn!(
                            "View {}/{} is outside the allow-list, fetching anyway",
                            descriptor.view, descriptor.entity
                        );
                    }
                    let result = self.source.fetch(&descriptor).await;
                    ViewResult::Fetched {
                        view: descriptor.view,
                        result,
                    }
                }
                Err(error) => ViewResult::Malformed { index, error },
            }
        });
        let results = join_all(tasks).await;

        let mut response = AskResponse {
            interpretation,
            suggestion,
            ..Default::default()
        };
        for result in results {
            match result {
                ViewResult::Fetched {
                    view,
                    result: Ok(rows),
                } => {
                    response.data.insert(view, rows);
                }
                ViewResult::Fetched {
                    view,
                    result: Err(e),
                } => {
                    warn!("Failed to process view {}: {}", view, e);
                    response.errors.insert(view.clone(), e.to_string());
                    response.data.insert(view, Vec::new());
                }
                ViewResult::Malformed { index, error } => match error.view() {
                    Some(view) => {
                        warn!("View descriptor {} for {} is incomplete: {}", index, view, error);
                        response.errors.insert(view.to_string(), error.to_string());
                        response.data.insert(view.to_string(), Vec::new());
                    }
                    None => {
                        warn!("Discarding view descriptor {}: {}", index, error);
                        response
                            .errors
                            .insert(format!("views[{}]", index), error.to_string());
                    }
                },
            }
        }
        response
    }
}
