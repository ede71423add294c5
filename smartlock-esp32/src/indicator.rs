//! Lock indicator on the built-in LED
//!
//! LED on while unlocked. Banners only go to the log: the dev board has no
//! display.

use esp_idf_svc::hal::gpio::{Gpio2, Output, PinDriver};
use log::*;
use smartlock_mcu::{ActuationSink, Banner, LockState};

pub struct LedIndicator {
    led: PinDriver<'static, Gpio2, Output>,
}

impl LedIndicator {
    pub fn new(led: PinDriver<'static, Gpio2, Output>) -> Self {
        Self { led }
    }
}

impl ActuationSink for LedIndicator {
    fn set_state(&mut self, state: LockState) {
        let result = match state {
            LockState::Locked => self.led.set_low(),
            LockState::Unlocked => self.led.set_high(),
        };
        if let Err(e) = result {
            error!("failed to drive LED: {:?}", e);
        }
        info!("Lock state: {}", state.as_str());
    }

    fn show_banner(&mut self, banner: Banner) {
        info!("*** {} ***", banner.as_str());
    }

    fn clear_banner(&mut self) {
        debug!("banner cleared");
    }
}
