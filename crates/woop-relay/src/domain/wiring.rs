//! How a woop is wired: which GPIO pin drives which actuator, and the pin
//! commands each request variant produces.

use woop_core::{PinCommand, PinName, PinWrite};

use crate::domain::request::{AlertPayload, BasicRequest, ColorRequest, ColorSetting, Variant};

/// Strobe light (alert and basic variants).
pub const STROBE_PIN: &str = "12";
/// Buzzer on the strobe woop.
pub const BASIC_BUZZER_PIN: &str = "14";
/// Lamp red channel (PWM).
pub const RED_PIN: &str = "19";
/// Lamp green channel (PWM).
pub const GREEN_PIN: &str = "18";
/// Lamp blue channel (PWM).
pub const BLUE_PIN: &str = "21";
/// Buzzer on the lamp woop.
pub const LAMP_BUZZER_PIN: &str = "5";

/// Pins looked up before any write on `variant`.
///
/// The colour variant resolves all four lamp pins even when the body only
/// touches some of them, so a miswired board fails with 417 up front.
pub fn pins_for(variant: Variant) -> Vec<PinName> {
    let names: &[&'static str] = match variant {
        Variant::Alert => &[STROBE_PIN],
        Variant::Basic => &[STROBE_PIN, BASIC_BUZZER_PIN],
        Variant::Color => &[RED_PIN, GREEN_PIN, BLUE_PIN, LAMP_BUZZER_PIN],
    };
    names.iter().copied().map(PinName::from_static).collect()
}

pub fn alert_commands(alert: &AlertPayload) -> Vec<PinCommand> {
    vec![digital(STROBE_PIN, alert.is_open())]
}

/// Strobe first, then buzzer.
pub fn basic_commands(request: BasicRequest) -> Vec<PinCommand> {
    vec![
        digital(STROBE_PIN, request.strobe),
        digital(BASIC_BUZZER_PIN, request.buzzer),
    ]
}

/// Red, green, blue, then buzzer; absent keys produce no command.
pub fn color_commands(request: &ColorRequest) -> Vec<PinCommand> {
    let channels = [
        (RED_PIN, request.red),
        (GREEN_PIN, request.green),
        (BLUE_PIN, request.blue),
    ];
    let mut commands: Vec<PinCommand> = channels
        .into_iter()
        .filter_map(|(pin, setting)| setting.map(|s| pwm(pin, s)))
        .collect();
    if let Some(on) = request.buzzer {
        commands.push(digital(LAMP_BUZZER_PIN, on));
    }
    commands
}

fn digital(pin: &'static str, high: bool) -> PinCommand {
    PinCommand::new(PinName::from_static(pin), PinWrite::Digital(high))
}

fn pwm(pin: &'static str, setting: ColorSetting) -> PinCommand {
    PinCommand::new(
        PinName::from_static(pin),
        PinWrite::Pwm {
            frequency_hz: setting.frequency_hz,
            duty: setting.duty,
        },
    )
}
