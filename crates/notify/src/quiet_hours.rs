use chrono::{Local, Timelike};

/// A quiet hours window. Inclusive of `start_hour`, exclusive of
/// `end_hour`. Defaults to 23:00-07:00 local, which wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            start_hour: 23,
            end_hour: 7,
        }
    }
}

impl QuietHours {
    pub fn new(start_hour: u8, end_hour: u8) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// True if `hour` (0-23) falls within the quiet window.
    pub fn contains_hour(&self, hour: u8) -> bool {
        if self.start_hour == self.end_hour {
            return false;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    pub fn is_quiet_now(&self) -> bool {
        self.contains_hour(Local::now().hour() as u8)
    }
}
