use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Storage(#[from] ballot_store_lmdb::LmdbError),

    #[error("store error: {0}")]
    Store(#[from] ballot_store::StoreError),

    #[error("data directory rejected: {0}")]
    DataDir(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RPC server error: {0}")]
    Rpc(#[from] ballot_rpc::RpcError),

    #[error("WebSocket server error: {0}")]
    WebSocket(#[from] ballot_websocket::WsError),
}
