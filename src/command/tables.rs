//! Switch-position decision tables
//!
//! Each mode is a closed enum and each lookup is a fixed array indexed by
//! switch position.

use serde::Serialize;

/// Drive kinematics selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DriveMode {
    None,
    FrontWheel,
    AllWheel,
    RearWheel,
    Spinning,
    Skid,
}

/// Which way the vehicle treats as forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum Orientation {
    East,
    #[default]
    North,
    West,
}

/// LED animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnimationMode {
    None,
    Headlights,
    KnightRider,
    Ambulance,
    Police,
    Construction,
    RunningLight,
    Rainbow,
    RainbowWave,
}

/// Indicator lights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IndicatorMode {
    None,
    Left,
    Right,
    Hazard,
}

const WHEEL_SELECT: [DriveMode; 3] = [DriveMode::FrontWheel, DriveMode::AllWheel, DriveMode::RearWheel];

const ORIENTATIONS: [Orientation; 3] = [Orientation::East, Orientation::North, Orientation::West];

const ANIMATIONS: [[AnimationMode; 3]; 3] = [
    [AnimationMode::None, AnimationMode::Headlights, AnimationMode::KnightRider],
    [AnimationMode::Ambulance, AnimationMode::Police, AnimationMode::Construction],
    [AnimationMode::RunningLight, AnimationMode::Rainbow, AnimationMode::RainbowWave],
];

const INDICATORS: [IndicatorMode; 3] = [IndicatorMode::Left, IndicatorMode::None, IndicatorMode::Right];

/// Switch A picks the family, switch E the driven axle when A = 0
pub fn drive_mode(switch_a: u32, switch_e: u32) -> DriveMode {
    match switch_a {
        0 => WHEEL_SELECT[position(switch_e)],
        1 => DriveMode::Spinning,
        _ => DriveMode::Skid,
    }
}

pub fn orientation(switch_b: u32) -> Orientation {
    ORIENTATIONS[position(switch_b)]
}

/// Switch C selects the row, switch D the column
pub fn animation(switch_c: u32, switch_d: u32) -> AnimationMode {
    ANIMATIONS[position(switch_c)][position(switch_d)]
}

/// Hazard overrides the left/right selection on switch G
pub fn indicator(switch_g: u32, hazard: bool) -> IndicatorMode {
    if hazard {
        IndicatorMode::Hazard
    } else {
        INDICATORS[position(switch_g)]
    }
}

/// Brightness quantized to 1/255 steps, returned as the step count
pub fn brightness_step(percent: f32) -> u8 {
    (percent.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn position(switch: u32) -> usize {
    (switch as usize).min(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_mode_table() {
        assert_eq!(drive_mode(0, 0), DriveMode::FrontWheel);
        assert_eq!(drive_mode(0, 1), DriveMode::AllWheel);
        assert_eq!(drive_mode(0, 2), DriveMode::RearWheel);
        for e in 0..3 {
            assert_eq!(drive_mode(1, e), DriveMode::Spinning);
            assert_eq!(drive_mode(2, e), DriveMode::Skid);
        }
    }

    #[test]
    fn test_orientation_table() {
        assert_eq!(orientation(0), Orientation::East);
        assert_eq!(orientation(1), Orientation::North);
        assert_eq!(orientation(2), Orientation::West);
        assert_eq!(Orientation::default(), Orientation::North);
    }

    #[test]
    fn test_animation_grid() {
        assert_eq!(animation(0, 0), AnimationMode::None);
        assert_eq!(animation(0, 2), AnimationMode::KnightRider);
        assert_eq!(animation(1, 1), AnimationMode::Police);
        assert_eq!(animation(2, 0), AnimationMode::RunningLight);
        assert_eq!(animation(2, 2), AnimationMode::RainbowWave);
    }

    #[test]
    fn test_indicator_hazard_overrides() {
        assert_eq!(indicator(0, false), IndicatorMode::Left);
        assert_eq!(indicator(1, false), IndicatorMode::None);
        assert_eq!(indicator(2, false), IndicatorMode::Right);
        for g in 0..3 {
            assert_eq!(indicator(g, true), IndicatorMode::Hazard);
        }
    }

    #[test]
    fn test_brightness_step() {
        assert_eq!(brightness_step(0.0), 0);
        assert_eq!(brightness_step(0.5), 128);
        assert_eq!(brightness_step(1.0), 255);
        assert_eq!(brightness_step(1.2), 255);
    }

    #[test]
    fn test_out_of_range_position_saturates() {
        assert_eq!(orientation(7), Orientation::West);
        assert_eq!(drive_mode(0, 9), DriveMode::RearWheel);
    }
}
