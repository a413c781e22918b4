//! Service admission modes.

/// Controls whether a service demands its dependencies preemptively and
/// whether it requires external demand to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    /// Demands its dependencies unconditionally from installation until
    /// removal; does not itself require external demand to start.
    Active,
    /// Does not demand its dependencies preemptively. Once externally
    /// demanded, latches that demand permanently and stays UP once
    /// started until removed.
    Lazy,
    /// Propagates demand only while itself demanded; stops once
    /// `demanded-by` returns to zero.
    OnDemand,
}
