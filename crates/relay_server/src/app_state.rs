use relay_api::RelayContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) relay: RelayContext,
    pub(crate) max_body_bytes: usize,
}
