//! Roster of every unit spawned through a coordinator.

use parking_lot::Mutex;

use crate::unit::Unit;

#[derive(Debug, Default)]
pub(crate) struct Roster {
    units: Mutex<Vec<Unit>>,
}

impl Roster {
    pub(crate) fn push(&self, unit: Unit) {
        self.units.lock().push(unit);
    }

    /// Units from index `from` on, in spawn order.
    pub(crate) fn since(&self, from: usize) -> Vec<Unit> {
        self.units.lock().get(from..).map(<[Unit]>::to_vec).unwrap_or_default()
    }

    pub(crate) fn take(&self) -> Vec<Unit> {
        std::mem::take(&mut *self.units.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.units.lock().len()
    }
}
