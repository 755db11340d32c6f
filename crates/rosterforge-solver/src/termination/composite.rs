//! Composite OR termination.
//!
//! Uses macro-generated tuple implementations for zero type erasure.

use super::Termination;
use crate::oracle::ScheduleOracle;
use crate::scope::RebalanceScope;

/// Combines multiple terminations with OR logic (any must terminate).
///
/// # Examples
///
/// ```
/// use rosterforge_solver::termination::{
///     IterationCountTermination, OrTermination, TimeTermination,
/// };
///
/// // Stop after 30 seconds OR 100 iterations
/// let termination = OrTermination((
///     TimeTermination::seconds(30),
///     IterationCountTermination::new(100),
/// ));
/// ```
#[derive(Debug)]
pub struct OrTermination<T>(pub T);

impl<T> OrTermination<T> {
    /// Creates a new OR termination from a tuple of terminations.
    pub fn new(terminations: T) -> Self {
        Self(terminations)
    }
}

/// Generates `Termination` implementations for OR tuples.
macro_rules! impl_or_termination {
    ($($idx:tt: $T:ident),+) => {
        impl<O, $($T),+> Termination<O> for OrTermination<($($T,)+)>
        where
            O: ScheduleOracle,
            $($T: Termination<O>,)+
        {
            fn is_terminated(&self, scope: &RebalanceScope<O>) -> bool {
                $((self.0).$idx.is_terminated(scope))||+
            }
        }
    };
}

impl_or_termination!(0: T0);
impl_or_termination!(0: T0, 1: T1);
impl_or_termination!(0: T0, 1: T1, 2: T2);
impl_or_termination!(0: T0, 1: T1, 2: T2, 3: T3);
