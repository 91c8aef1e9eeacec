/// WebSocket close codes the admission step can use. Standard codes
/// (1000 normal close, etc.) are left to axum/tungstenite defaults.
pub const CLOSE_AUTH_FAILED: u16 = 4001;
pub const CLOSE_ORIGIN_REJECTED: u16 = 4003;
