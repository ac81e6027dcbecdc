//! # Command Decoder Module
//!
//! Turns channel snapshots into motion and lighting commands.
//!
//! ## Channel Assignments (defaults, see [`MappingConfig`])
//!
//! | Channel | Input | Function |
//! |---------|-------|----------|
//! | 0 | Throttle stick | throttle |
//! | 1 | Aileron stick | steering direction |
//! | 2 | Elevator stick | aux Y |
//! | 3 | Rudder stick | aux X |
//! | 5 | Dial 2 | brightness |
//! | 6, 10 | Switches A, E | drive mode |
//! | 7 | Switch B | orientation |
//! | 8, 9 | Switches C, D | animation |
//! | 11 | Switch F | safety (arm) |
//! | 12, 14 | Switches G, I | indicators / hazard |
//! | 13 | Switch H | reverse |
//!
//! Steering is sent every snapshot while armed. Every other output is
//! edge-triggered and only emitted when it differs from the previous one.

pub mod arming;
pub mod switches;
pub mod tables;

use tracing::debug;

use crate::config::MappingConfig;
use crate::fbus::protocol::CHANNEL_UNSET;
use crate::link::shared::ChannelSnapshot;
use crate::receiver::events::LinkEvent;
use arming::{ArmState, ArmTransition, Arming};
use switches::{as_button, as_float, as_percent, as_toggle};
use tables::{AnimationMode, DriveMode, IndicatorMode, Orientation};

/// Stateful decoder evaluated once per new snapshot
#[derive(Debug)]
pub struct CommandDecoder {
    mapping: MappingConfig,
    arming: Arming,
    drive_mode: Option<DriveMode>,
    orientation: Option<Orientation>,
    animation: Option<AnimationMode>,
    indicator: Option<IndicatorMode>,
    brightness: Option<u8>,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new(MappingConfig::default())
    }
}

impl CommandDecoder {
    pub fn new(mapping: MappingConfig) -> Self {
        Self {
            mapping,
            arming: Arming::new(),
            drive_mode: None,
            orientation: None,
            animation: None,
            indicator: None,
            brightness: None,
        }
    }

    pub fn arm_state(&self) -> ArmState {
        self.arming.state()
    }

    /// Decode one snapshot into the events it causes
    ///
    /// A frame-lost snapshot zeroes steering, drops the drive mode and
    /// disarms; nothing else is decoded for it.
    pub fn decode(&mut self, snapshot: &ChannelSnapshot) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        let channel = |index: usize| snapshot.channels.get(index).copied().unwrap_or(CHANNEL_UNSET);
        let map = &self.mapping;

        if snapshot.flags.frame_lost() {
            if self.arming.update(true, false) == Some(ArmTransition::Disarmed) {
                events.push(LinkEvent::Armed(false));
            }
            events.push(LinkEvent::steer_zero());
            Self::emit_changed(&mut self.drive_mode, DriveMode::None, &mut events, LinkEvent::DriveMode);
            return events;
        }

        let safety_on = as_toggle(channel(map.switch_f));
        match self.arming.update(false, safety_on) {
            Some(ArmTransition::Armed) => events.push(LinkEvent::Armed(true)),
            Some(ArmTransition::Disarmed) => {
                events.push(LinkEvent::steer_zero());
                Self::emit_changed(&mut self.drive_mode, DriveMode::None, &mut events, LinkEvent::DriveMode);
                events.push(LinkEvent::Armed(false));
            }
            None => {}
        }
        let armed = self.arming.state().is_armed();

        let drive_mode = if armed {
            tables::drive_mode(as_button(channel(map.switch_a), 3), as_button(channel(map.switch_e), 3))
        } else {
            DriveMode::None
        };
        Self::emit_changed(&mut self.drive_mode, drive_mode, &mut events, LinkEvent::DriveMode);

        if armed {
            let reverse = as_toggle(channel(map.switch_h));
            let throttle = as_float(channel(map.throttle));
            events.push(LinkEvent::Steer {
                direction: as_float(channel(map.steering)),
                throttle: if reverse { -throttle } else { throttle },
                aux_x: as_float(channel(map.aux_x)),
                aux_y: as_float(channel(map.aux_y)),
            });
        }

        let orientation = tables::orientation(as_button(channel(map.switch_b), 3));
        Self::emit_changed(&mut self.orientation, orientation, &mut events, LinkEvent::Orientation);

        let animation = tables::animation(
            as_button(channel(map.switch_c), 3),
            as_button(channel(map.switch_d), 3),
        );
        Self::emit_changed(&mut self.animation, animation, &mut events, LinkEvent::AnimationMode);

        let indicator = tables::indicator(as_button(channel(map.switch_g), 3), as_toggle(channel(map.switch_i)));
        Self::emit_changed(&mut self.indicator, indicator, &mut events, LinkEvent::IndicatorMode);

        let step = tables::brightness_step(as_percent(channel(map.dial2)));
        Self::emit_changed(&mut self.brightness, step, &mut events, |s| {
            LinkEvent::Brightness(s as f32 / 255.0)
        });

        if !events.is_empty() {
            debug!("Decoded {} command events", events.len());
        }
        events
    }

    fn emit_changed<T: Copy + PartialEq>(
        last: &mut Option<T>,
        value: T,
        events: &mut Vec<LinkEvent>,
        event: impl FnOnce(T) -> LinkEvent,
    ) {
        if *last != Some(value) {
            *last = Some(value);
            events.push(event(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::protocol::{Flags, FBUS_MAX_CHANNELS};

    const LOW: u32 = 500;
    const MID: u32 = 1500;
    const HIGH: u32 = 2500;

    fn snapshot(channels: &[(usize, u32)], flags: Flags) -> ChannelSnapshot {
        let mut values = [MID; FBUS_MAX_CHANNELS];
        // Safety and toggles default off
        for index in [11, 13, 14] {
            values[index] = LOW;
        }
        for &(index, value) in channels {
            values[index] = value;
        }
        ChannelSnapshot {
            generation: 1,
            flags,
            quality: 100,
            channel_count: 16,
            channels: values,
        }
    }

    fn ok(channels: &[(usize, u32)]) -> ChannelSnapshot {
        snapshot(channels, Flags::default())
    }

    fn arm(decoder: &mut CommandDecoder) {
        decoder.decode(&ok(&[(11, LOW)]));
        decoder.decode(&ok(&[(11, HIGH)]));
        assert!(decoder.arm_state().is_armed());
    }

    fn steers(events: &[LinkEvent]) -> Vec<&LinkEvent> {
        events.iter().filter(|e| matches!(e, LinkEvent::Steer { .. })).collect()
    }

    // ==================== Failsafe Tests ====================

    #[test]
    fn test_frame_lost_forces_safe_outputs() {
        let mut decoder = CommandDecoder::default();
        let events = decoder.decode(&snapshot(&[], Flags(Flags::FRAME_LOST)));

        assert_eq!(
            events,
            vec![LinkEvent::steer_zero(), LinkEvent::DriveMode(DriveMode::None)]
        );
        assert_eq!(decoder.arm_state(), ArmState::DisarmedCannotArm);
    }

    #[test]
    fn test_frame_lost_while_armed_disarms() {
        let mut decoder = CommandDecoder::default();
        arm(&mut decoder);

        let events = decoder.decode(&snapshot(&[(11, HIGH)], Flags(Flags::FRAME_LOST)));
        assert!(events.contains(&LinkEvent::Armed(false)));
        assert!(events.contains(&LinkEvent::steer_zero()));
        assert!(events.contains(&LinkEvent::DriveMode(DriveMode::None)));

        // Back with the switch still on: no re-arm
        let events = decoder.decode(&ok(&[(11, HIGH)]));
        assert!(steers(&events).is_empty());
        assert!(!decoder.arm_state().is_armed());
    }

    // ==================== Arming Tests ====================

    #[test]
    fn test_disarmed_emits_no_steer() {
        let mut decoder = CommandDecoder::default();
        let events = decoder.decode(&ok(&[(0, HIGH)]));
        assert!(steers(&events).is_empty());
        assert!(events.contains(&LinkEvent::DriveMode(DriveMode::None)));
    }

    #[test]
    fn test_armed_steer_every_snapshot() {
        let mut decoder = CommandDecoder::default();
        arm(&mut decoder);

        for _ in 0..3 {
            let events = decoder.decode(&ok(&[(11, HIGH), (0, 2000), (1, 1000)]));
            assert_eq!(
                steers(&events),
                vec![&LinkEvent::Steer {
                    direction: -0.5,
                    throttle: 0.5,
                    aux_x: 0.0,
                    aux_y: 0.0,
                }]
            );
        }
    }

    #[test]
    fn test_arming_emits_event_and_drive_mode() {
        let mut decoder = CommandDecoder::default();
        decoder.decode(&ok(&[(11, LOW), (6, LOW), (10, HIGH)]));
        let events = decoder.decode(&ok(&[(11, HIGH), (6, LOW), (10, HIGH)]));

        assert!(events.contains(&LinkEvent::Armed(true)));
        assert!(events.contains(&LinkEvent::DriveMode(DriveMode::RearWheel)));
    }

    #[test]
    fn test_disarm_zeroes_steer_once() {
        let mut decoder = CommandDecoder::default();
        arm(&mut decoder);
        decoder.decode(&ok(&[(11, HIGH), (0, HIGH)]));

        let events = decoder.decode(&ok(&[(11, LOW), (0, HIGH)]));
        assert_eq!(steers(&events), vec![&LinkEvent::steer_zero()]);
        assert!(events.contains(&LinkEvent::DriveMode(DriveMode::None)));
        assert!(events.contains(&LinkEvent::Armed(false)));

        let events = decoder.decode(&ok(&[(11, LOW), (0, HIGH)]));
        assert!(steers(&events).is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_reverse_negates_throttle() {
        let mut decoder = CommandDecoder::default();
        arm(&mut decoder);

        let events = decoder.decode(&ok(&[(11, HIGH), (13, HIGH), (0, 2000)]));
        match steers(&events)[0] {
            LinkEvent::Steer { throttle, .. } => assert_eq!(*throttle, -0.5),
            other => panic!("Expected Steer, got {:?}", other),
        }
    }

    // ==================== Edge Trigger Tests ====================

    #[test]
    fn test_led_outputs_decode_while_disarmed() {
        let mut decoder = CommandDecoder::default();
        let events = decoder.decode(&ok(&[(7, LOW), (8, HIGH), (9, MID), (12, HIGH)]));

        assert!(events.contains(&LinkEvent::Orientation(Orientation::East)));
        assert!(events.contains(&LinkEvent::AnimationMode(AnimationMode::Rainbow)));
        assert!(events.contains(&LinkEvent::IndicatorMode(IndicatorMode::Right)));
        assert!(events.contains(&LinkEvent::Brightness(128.0 / 255.0)));
    }

    #[test]
    fn test_unchanged_outputs_not_reemitted() {
        let mut decoder = CommandDecoder::default();
        let first = decoder.decode(&ok(&[]));
        assert!(!first.is_empty());

        let second = decoder.decode(&ok(&[]));
        assert!(second.is_empty());

        let third = decoder.decode(&ok(&[(14, HIGH)]));
        assert_eq!(third, vec![LinkEvent::IndicatorMode(IndicatorMode::Hazard)]);
    }

    #[test]
    fn test_brightness_edge_on_step_change() {
        let mut decoder = CommandDecoder::default();
        decoder.decode(&ok(&[(5, LOW)]));

        // Less than half a step: same brightness
        let events = decoder.decode(&ok(&[(5, 502)]));
        assert!(events.is_empty());

        let events = decoder.decode(&ok(&[(5, HIGH)]));
        assert_eq!(events, vec![LinkEvent::Brightness(1.0)]);
    }

    #[test]
    fn test_custom_mapping() {
        let mapping = MappingConfig {
            switch_b: 20,
            ..MappingConfig::default()
        };
        let mut decoder = CommandDecoder::new(mapping);
        let events = decoder.decode(&ok(&[(20, HIGH), (7, LOW)]));
        assert!(events.contains(&LinkEvent::Orientation(Orientation::West)));
    }
}
