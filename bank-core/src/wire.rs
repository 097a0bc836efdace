//! Payload layouts carried inside bus messages
//!
//! All integers are little-endian, matching the frame header.
//!
//! ```text
//! TRANSFER         src u8 | dst u8 | amount i32
//! BALANCE_HISTORY  owner u8 | len u16 | len × (time i32 | balance i32 | pending_in i32)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    error::{Error, Result},
    ledger::{BalanceHistory, BalanceState},
    types::TransferOrder,
};

/// Encoded TRANSFER payload size
pub const TRANSFER_ORDER_LEN: usize = 1 + 1 + 4;

/// Encoded size of one history entry
pub const BALANCE_STATE_LEN: usize = 4 + 4 + 4;

/// Owner and entry count preceding history entries
pub const HISTORY_HEADER_LEN: usize = 1 + 2;

/// Encode a TRANSFER payload
pub fn encode_transfer(order: &TransferOrder) -> Bytes {
    let mut buf = BytesMut::with_capacity(TRANSFER_ORDER_LEN);
    buf.put_u8(order.src);
    buf.put_u8(order.dst);
    buf.put_i32_le(order.amount);
    buf.freeze()
}

/// Decode a TRANSFER payload
pub fn decode_transfer(payload: &[u8]) -> Result<TransferOrder> {
    if payload.len() != TRANSFER_ORDER_LEN {
        return Err(Error::Wire(format!(
            "transfer payload is {} bytes, expected {}",
            payload.len(),
            TRANSFER_ORDER_LEN
        )));
    }

    let mut buf = payload;
    Ok(TransferOrder {
        src: buf.get_u8(),
        dst: buf.get_u8(),
        amount: buf.get_i32_le(),
    })
}

/// Encode a BALANCE_HISTORY payload
pub fn encode_history(history: &BalanceHistory) -> Bytes {
    let states = history.states();
    let mut buf = BytesMut::with_capacity(HISTORY_HEADER_LEN + states.len() * BALANCE_STATE_LEN);
    buf.put_u8(history.owner());
    // Bounded by MAX_HISTORY_LEN
    buf.put_u16_le(states.len() as u16);
    for state in states {
        buf.put_i32_le(state.time);
        buf.put_i32_le(state.balance);
        buf.put_i32_le(state.pending_in);
    }
    buf.freeze()
}

/// Decode a BALANCE_HISTORY payload
pub fn decode_history(payload: &[u8]) -> Result<BalanceHistory> {
    if payload.len() < HISTORY_HEADER_LEN {
        return Err(Error::Wire(format!(
            "history payload is {} bytes, header needs {}",
            payload.len(),
            HISTORY_HEADER_LEN
        )));
    }

    let mut buf = payload;
    let owner = buf.get_u8();
    let len = buf.get_u16_le() as usize;
    if buf.remaining() != len * BALANCE_STATE_LEN {
        return Err(Error::Wire(format!(
            "history of {} declares {} entries but carries {} bytes",
            owner,
            len,
            buf.remaining()
        )));
    }

    let mut states = Vec::with_capacity(len);
    for _ in 0..len {
        states.push(BalanceState {
            time: buf.get_i32_le(),
            balance: buf.get_i32_le(),
            pending_in: buf.get_i32_le(),
        });
    }
    BalanceHistory::from_states(owner, states)
}
