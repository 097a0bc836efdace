//! Transfer drivers
//!
//! The coordinator hands itself to a driver as a [`TransferIssuer`] once the
//! STARTED barrier completes. The driver issues transfers one at a time; each
//! call returns only after the receiving worker acknowledged.

use tracing::debug;

use crate::{
    types::{Balance, ParticipantId, TransferOrder},
    Result,
};

/// Issues synchronous transfers between workers
pub trait TransferIssuer {
    /// Move `amount` from `src` to `dst` and wait for the acknowledgement
    fn issue_transfer(&mut self, src: ParticipantId, dst: ParticipantId, amount: Balance) -> Result<()>;

    /// Worker ids, ascending
    fn worker_ids(&self) -> Vec<ParticipantId>;
}

/// Produces the transfer workload of a run
pub trait TransferDriver {
    /// Issue every transfer of the workload
    fn drive(&mut self, issuer: &mut dyn TransferIssuer) -> Result<()>;
}

impl<F> TransferDriver for F
where
    F: FnMut(&mut dyn TransferIssuer) -> Result<()>,
{
    fn drive(&mut self, issuer: &mut dyn TransferIssuer) -> Result<()> {
        self(issuer)
    }
}

/// Passes money around the ring of workers: `i` sends `$i` to `i + 1`,
/// then the last worker sends `$1` back to the first
#[derive(Debug, Clone, Copy, Default)]
pub struct RingDriver;

impl RingDriver {
    /// Ring orders over `workers`
    pub fn orders(workers: impl IntoIterator<Item = ParticipantId>) -> Vec<TransferOrder> {
        let max = match workers.into_iter().max() {
            Some(max) => max,
            None => return Vec::new(),
        };

        let mut orders: Vec<_> = (1..max)
            .map(|i| TransferOrder::new(i, i + 1, Balance::from(i)))
            .collect();
        if max > 1 {
            orders.push(TransferOrder::new(max, 1, 1));
        }
        orders
    }
}

impl TransferDriver for RingDriver {
    fn drive(&mut self, issuer: &mut dyn TransferIssuer) -> Result<()> {
        let orders = Self::orders(issuer.worker_ids());
        ScriptedDriver::new(orders).drive(issuer)
    }
}

/// Replays a fixed list of orders
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    orders: Vec<TransferOrder>,
}

impl ScriptedDriver {
    /// Driver for `orders`
    pub fn new(orders: Vec<TransferOrder>) -> Self {
        Self { orders }
    }

    /// Orders in issue order
    pub fn orders(&self) -> &[TransferOrder] {
        &self.orders
    }
}

impl TransferDriver for ScriptedDriver {
    fn drive(&mut self, issuer: &mut dyn TransferIssuer) -> Result<()> {
        for order in &self.orders {
            debug!(src = order.src, dst = order.dst, amount = order.amount, "issuing transfer");
            issuer.issue_transfer(order.src, order.dst, order.amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        workers: Vec<ParticipantId>,
        issued: Vec<TransferOrder>,
    }

    impl TransferIssuer for Recorder {
        fn issue_transfer(&mut self, src: ParticipantId, dst: ParticipantId, amount: Balance) -> Result<()> {
            self.issued.push(TransferOrder::new(src, dst, amount));
            Ok(())
        }

        fn worker_ids(&self) -> Vec<ParticipantId> {
            self.workers.clone()
        }
    }

    #[test]
    fn test_ring_orders() {
        let mut recorder = Recorder {
            workers: vec![1, 2, 3, 4],
            ..Default::default()
        };
        RingDriver.drive(&mut recorder).unwrap();

        assert_eq!(
            recorder.issued,
            vec![
                TransferOrder::new(1, 2, 1),
                TransferOrder::new(2, 3, 2),
                TransferOrder::new(3, 4, 3),
                TransferOrder::new(4, 1, 1),
            ]
        );
    }

    #[test]
    fn test_ring_single_worker_is_empty() {
        assert!(RingDriver::orders([1]).is_empty());
        assert!(RingDriver::orders(Vec::new()).is_empty());
    }

    #[test]
    fn test_scripted_stops_at_first_error() {
        struct Failing(usize);
        impl TransferIssuer for Failing {
            fn issue_transfer(&mut self, _: ParticipantId, _: ParticipantId, _: Balance) -> Result<()> {
                self.0 += 1;
                Err(crate::Error::InvalidTransfer("refused".into()))
            }
            fn worker_ids(&self) -> Vec<ParticipantId> {
                vec![1, 2]
            }
        }

        let mut issuer = Failing(0);
        let mut driver = ScriptedDriver::new(vec![TransferOrder::new(1, 2, 1); 3]);
        assert!(driver.drive(&mut issuer).is_err());
        assert_eq!(issuer.0, 1);
    }

    #[test]
    fn test_closure_driver() {
        let mut recorder = Recorder::default();
        let mut driver = |issuer: &mut dyn TransferIssuer| issuer.issue_transfer(2, 1, 7);
        driver.drive(&mut recorder).unwrap();
        assert_eq!(recorder.issued, vec![TransferOrder::new(2, 1, 7)]);
    }
}
