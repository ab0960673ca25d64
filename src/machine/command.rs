use tokio::sync::oneshot;

use super::dispatcher::MachineSnapshot;
use crate::protocol::response::Report;

#[derive(Debug)]
pub enum Command {
    Request {
        frame: Report,
        resp: oneshot::Sender<Option<Report>>,
    },
    Snapshot {
        resp: oneshot::Sender<MachineSnapshot>,
    },
    Shutdown,
}
