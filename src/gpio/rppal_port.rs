//! Raspberry Pi GPIO port backed by `rppal`.
//!
//! `rppal` delivers edge interrupts on its own thread per input pin. One
//! interrupt for both edges is installed per pin and dispatched to the
//! callbacks registered for each edge.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rppal::gpio::{Event, Gpio, InputPin, OutputPin, Trigger};
use tracing::debug;

use super::{lock, EdgeCallback, GpioError, GpioPort};
use crate::types::{Edge, PinId, PinLevel, PinMode};

type CallbackTable = Arc<Mutex<HashMap<Edge, EdgeCallback>>>;

enum OpenPin {
    Output(OutputPin),
    Input {
        pin: InputPin,
        callbacks: CallbackTable,
        interrupt_installed: bool,
    },
}

/// GPIO port driving the SoC GPIO block through `/dev/gpiomem`.
pub struct RppalGpioPort {
    controller: Result<Gpio, String>,
    pins: Mutex<HashMap<PinId, OpenPin>>,
}

impl RppalGpioPort {
    /// Opens the GPIO controller.
    ///
    /// # Errors
    ///
    /// Returns `GpioError::ControllerUnavailable` if the GPIO block cannot be
    /// mapped (not a Raspberry Pi, missing permissions).
    pub fn new() -> Result<Self, GpioError> {
        let gpio = Gpio::new().map_err(|e| GpioError::ControllerUnavailable(e.to_string()))?;
        Ok(Self {
            controller: Ok(gpio),
            pins: Mutex::new(HashMap::new()),
        })
    }

    /// Creates a port whose every operation fails with `reason`.
    ///
    /// Lets the daemon stay alive and log each failed step when the
    /// controller is missing.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            controller: Err(reason.into()),
            pins: Mutex::new(HashMap::new()),
        }
    }

    fn controller(&self) -> Result<&Gpio, GpioError> {
        self.controller
            .as_ref()
            .map_err(|reason| GpioError::ControllerUnavailable(reason.clone()))
    }
}

fn dispatch(callbacks: &Mutex<HashMap<Edge, EdgeCallback>>, event: Event) {
    let edge = match event.trigger {
        Trigger::RisingEdge => Edge::Rising,
        Trigger::FallingEdge => Edge::Falling,
        _ => return,
    };
    let callback = lock(callbacks).get(&edge).cloned();
    if let Some(callback) = callback {
        callback();
    }
}

impl GpioPort for RppalGpioPort {
    fn open_pin(&self, pin: PinId, mode: PinMode) -> Result<(), GpioError> {
        let bcm = pin.bcm().ok_or(GpioError::InvalidPin(pin))?;
        let raw = self
            .controller()?
            .get(bcm)
            .map_err(|e| GpioError::OpenFailed(pin, e.to_string()))?;

        let open = match mode {
            PinMode::Output => OpenPin::Output(raw.into_output_low()),
            PinMode::InputPullDown => OpenPin::Input {
                pin: raw.into_input_pulldown(),
                callbacks: Arc::new(Mutex::new(HashMap::new())),
                interrupt_installed: false,
            },
        };
        debug!("{} opened as BCM {}", pin, bcm);

        lock(&self.pins).insert(pin, open);
        Ok(())
    }

    fn write(&self, pin: PinId, level: PinLevel) -> Result<(), GpioError> {
        let mut pins = lock(&self.pins);
        match pins.get_mut(&pin) {
            Some(OpenPin::Output(output)) => {
                match level {
                    PinLevel::High => output.set_high(),
                    PinLevel::Low => output.set_low(),
                }
                Ok(())
            }
            Some(OpenPin::Input { .. }) => Err(GpioError::WrongMode(pin)),
            None => Err(GpioError::PinNotOpen(pin)),
        }
    }

    fn register_callback(
        &self,
        pin: PinId,
        edge: Edge,
        callback: EdgeCallback,
    ) -> Result<(), GpioError> {
        let mut pins = lock(&self.pins);
        let Some(open) = pins.get_mut(&pin) else {
            return Err(GpioError::PinNotOpen(pin));
        };
        let OpenPin::Input {
            pin: input,
            callbacks,
            interrupt_installed,
        } = open
        else {
            return Err(GpioError::WrongMode(pin));
        };

        let table = callbacks.clone();
        lock(table.as_ref()).insert(edge, callback);

        if !*interrupt_installed {
            let dispatch_table = table.clone();
            let installed = input.set_async_interrupt(Trigger::Both, None, move |event| {
                dispatch(dispatch_table.as_ref(), event)
            });
            if let Err(e) = installed {
                lock(table.as_ref()).remove(&edge);
                return Err(GpioError::CallbackFailed(pin, edge, e.to_string()));
            }
            *interrupt_installed = true;
        }
        Ok(())
    }

    fn unregister_callback(&self, pin: PinId, edge: Edge) -> Result<(), GpioError> {
        let mut pins = lock(&self.pins);
        let Some(open) = pins.get_mut(&pin) else {
            return Err(GpioError::PinNotOpen(pin));
        };
        let OpenPin::Input {
            pin: input,
            callbacks,
            interrupt_installed,
        } = open
        else {
            return Err(GpioError::WrongMode(pin));
        };

        let now_empty = {
            let mut table = lock(callbacks.as_ref());
            table.remove(&edge);
            table.is_empty()
        };

        if now_empty && *interrupt_installed {
            input
                .clear_async_interrupt()
                .map_err(|e| GpioError::CallbackFailed(pin, edge, e.to_string()))?;
            *interrupt_installed = false;
        }
        Ok(())
    }

    fn close_pin(&self, pin: PinId) -> Result<(), GpioError> {
        let removed = lock(&self.pins).remove(&pin);
        match removed {
            Some(OpenPin::Input {
                pin: mut input,
                interrupt_installed: true,
                ..
            }) => input
                .clear_async_interrupt()
                .map_err(|e| GpioError::CloseFailed(pin, e.to_string())),
            // Dropping the handle resets the line to its previous mode.
            Some(_) => Ok(()),
            None => Err(GpioError::PinNotOpen(pin)),
        }
    }

    fn is_open(&self, pin: PinId) -> bool {
        lock(&self.pins).contains_key(&pin)
    }
}
