//! Prometheus metrics for the channel bus

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    /// Total frames written
    pub static ref FRAME_SEND_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ipc_bus_send_total",
        "Total frames written to channels",
        &["message_type", "status"]
    )
    .expect("ipc_bus_send_total registers once");

    /// Total frames read
    pub static ref FRAME_RECEIVE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ipc_bus_receive_total",
        "Total frames read from channels",
        &["message_type"]
    )
    .expect("ipc_bus_receive_total registers once");

    /// Total bytes written, header included
    pub static ref FRAME_BYTES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ipc_bus_bytes_total",
        "Total frame bytes written to channels",
        &["message_type"]
    )
    .expect("ipc_bus_bytes_total registers once");
}

/// Record the outcome of one send
pub fn record_send(message_type: &str, frame_len: usize, ok: bool) {
    let status = if ok { "success" } else { "error" };
    FRAME_SEND_TOTAL.with_label_values(&[message_type, status]).inc();
    if ok {
        FRAME_BYTES_TOTAL
            .with_label_values(&[message_type])
            .inc_by(frame_len as u64);
    }
}

/// Record one received frame
pub fn record_receive(message_type: &str) {
    FRAME_RECEIVE_TOTAL.with_label_values(&[message_type]).inc();
}
