use std::ops::Mul;

use chrono::TimeDelta;

use crate::quantity::energy::KilowattHours;

quantity!(Watts, "W", 0);

impl Mul<TimeDelta> for Watts {
    type Output = KilowattHours;

    fn mul(self, rhs: TimeDelta) -> Self::Output {
        KilowattHours(self.0 * rhs.as_seconds_f64() / 3_600_000.0)
    }
}
