//! Background threads for searches and preview loads

use crate::session::{Dispatch, PreviewRequest};
use fif_preview::{Preview, PreviewError};
use fif_search::{CancelToken, Match, Ripgrep, SearchError, SearchRequest};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Result of one search, tagged with the generation it was issued under
#[derive(Debug)]
pub struct SearchOutcome {
    pub generation: u64,
    pub result: Result<Vec<Match>, SearchError>,
}

#[derive(Debug)]
pub struct PreviewOutcome {
    pub request: PreviewRequest,
    pub result: Result<Preview, PreviewError>,
}

/// Thread-backed [`Dispatch`]: one short-lived thread per search, one
/// long-lived thread for previews
pub struct Workers {
    ripgrep: Ripgrep,
    search_tx: Sender<SearchOutcome>,
    preview_tx: Sender<PreviewRequest>,
}

impl Workers {
    /// Start the preview worker. Outcomes arrive on the returned receivers.
    pub fn spawn(ripgrep: Ripgrep) -> (Self, Receiver<SearchOutcome>, Receiver<PreviewOutcome>) {
        let (search_tx, search_rx) = mpsc::channel::<SearchOutcome>();
        let (preview_tx, preview_req_rx) = mpsc::channel::<PreviewRequest>();
        let (preview_resp_tx, preview_rx) = mpsc::channel::<PreviewOutcome>();

        spawn_preview_worker(preview_req_rx, preview_resp_tx);

        let workers = Self {
            ripgrep,
            search_tx,
            preview_tx,
        };
        (workers, search_rx, preview_rx)
    }
}

impl Dispatch for Workers {
    fn search(&mut self, request: SearchRequest) -> CancelToken {
        let token = CancelToken::new();
        let worker_token = token.clone();
        let ripgrep = self.ripgrep.clone();
        let tx = self.search_tx.clone();

        thread::spawn(move || {
            let generation = request.generation;
            let result = match ripgrep.search(&request, &worker_token) {
                Ok(Some(matches)) => Ok(matches),
                Ok(None) => {
                    log::debug!("search #{generation} cancelled");
                    return;
                }
                Err(e) => Err(e),
            };
            // The receiver is gone once the session has ended
            let _ = tx.send(SearchOutcome { generation, result });
        });

        token
    }

    fn preview(&mut self, request: PreviewRequest) {
        if self.preview_tx.send(request).is_err() {
            log::warn!("preview worker has stopped");
        }
    }
}

/// Load previews one at a time, skipping requests superseded while busy
pub fn spawn_preview_worker(
    req_rx: Receiver<PreviewRequest>,
    resp_tx: Sender<PreviewOutcome>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(mut request) = req_rx.recv() {
            // Coalesce rapid selection changes - keep only the latest request
            while let Ok(next) = req_rx.try_recv() {
                request = next;
            }

            let result = fif_preview::load(&request.file, request.line);
            if let Err(e) = &result {
                log::debug!("preview failed: {e}");
            }
            if resp_tx.send(PreviewOutcome { request, result }).is_err() {
                break;
            }
        }
    })
}
