use crate::gui_bridge::model::VisualizationModel;
use mmwcore::DecodedFrame;
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::Filter;

pub fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

/// Publishes decoded frames to display collaborators. Consumers only ever
/// see clones; the sensor's own state is never shared.
#[derive(Clone, Default)]
pub struct FrameBridge {
    state: Arc<RwLock<VisualizationModel>>,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `GET /frame` (latest snapshot) and `GET /status` on a
    /// background thread.
    pub fn serve(&self, address: SocketAddr) {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());

        let frame_route = warp::path("frame")
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: Arc<RwLock<VisualizationModel>>| {
                let model = match state.read() {
                    Ok(guard) => guard.clone(),
                    Err(poisoned) => poisoned.into_inner().clone(),
                };
                warp::reply::json(&model)
            });

        let status_route = warp::path("status")
            .and(warp::get())
            .and(state_filter)
            .map(|state: Arc<RwLock<VisualizationModel>>| {
                let (frames, status) = match state.read() {
                    Ok(guard) => (guard.frames_seen, guard.status.clone()),
                    Err(poisoned) => {
                        let guard = poisoned.into_inner();
                        (guard.frames_seen, guard.status.clone())
                    }
                };
                warp::reply::json(&json!({"frames": frames, "status": status}))
            });

        thread::spawn(move || {
            let routes = frame_route.or(status_route);
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("frame bridge runtime failed to start: {}", err);
                    return;
                }
            };
            log::info!("frame bridge listening on http://{}", address);
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        });
    }

    fn update<F: FnOnce(&mut VisualizationModel)>(&self, f: F) {
        match self.state.write() {
            Ok(mut guard) => f(&mut *guard),
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                f(&mut *guard)
            }
        }
    }

    pub fn publish(&self, frame: &DecodedFrame) {
        self.update(|model| *model = model.with_frame(frame));
        log::debug!(
            "[bridge] frame {} points {}",
            frame.frame_number(),
            frame.detected_points.as_ref().map_or(0, Vec::len)
        );
    }

    pub fn publish_status(&self, message: &str) {
        self.update(|model| model.status = message.to_string());
        log::info!("[bridge] {}", message);
    }

    pub fn snapshot(&self) -> VisualizationModel {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
