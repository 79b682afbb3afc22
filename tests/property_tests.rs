//! Property tests for the rendering invariants

use pace_rail::colors::scale;
use pace_rail::{CompletionPolicy, Event, Framebuffer, Rgb, RunState, blend_additive, draw_trail};
use proptest::prelude::*;

fn any_rgb() -> impl Strategy<Value = Rgb> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| Rgb::new(r, g, b))
}

proptest! {
    #[test]
    fn blend_is_saturating_sum(a in any_rgb(), b in any_rgb()) {
        let sum = blend_additive(a, b);
        prop_assert_eq!(u16::from(sum.red), (u16::from(a.red) + u16::from(b.red)).min(255));
        prop_assert_eq!(u16::from(sum.green), (u16::from(a.green) + u16::from(b.green)).min(255));
        prop_assert_eq!(u16::from(sum.blue), (u16::from(a.blue) + u16::from(b.blue)).min(255));
    }

    #[test]
    fn trail_levels_fade_monotonically(color in any_rgb(), trail_len in 0usize..40) {
        let event = Event::builder()
            .distance_m(400)
            .target_time_s(60.0)
            .color(color)
            .trail_len(trail_len)
            .build()
            .unwrap();
        let levels = event.trail_levels();

        prop_assert_eq!(levels.len(), trail_len + 1);
        prop_assert_eq!(*levels.last().unwrap(), color);
        if trail_len > 0 {
            prop_assert_eq!(levels[0], scale(color, 0.1));
        }
        for pair in levels.windows(2) {
            prop_assert!(pair[0].red <= pair[1].red);
            prop_assert!(pair[0].green <= pair[1].green);
            prop_assert!(pair[0].blue <= pair[1].blue);
        }
    }

    #[test]
    fn position_stays_on_rail_and_wraps_count_once(
        rail_leds in 1usize..400,
        laps_m in 50u32..1000,
        distance_m in 100u32..5000,
        target in 10.0f64..600.0,
        fractions in proptest::collection::vec(0.0f64..0.99, 1..200),
    ) {
        let event = Event::builder()
            .distance_m(distance_m)
            .target_time_s(target)
            .rail_leds(rail_leds)
            .laps_m(laps_m)
            .build()
            .unwrap();
        let mut state = RunState::new(&event, CompletionPolicy::Traversals);
        let rail = rail_leds as f64;

        // Each step moves less than one full rail
        for fraction in fractions {
            let dt = fraction * rail / state.velocity();
            let before = state.position();
            let meters = state.meters_done();
            let count = state.traversal_count();
            let moved = before + state.velocity() * dt;

            state.advance(dt);

            prop_assert!(state.position() >= 0.0 && state.position() < rail);
            prop_assert!(state.meters_done() >= meters);
            let expected = if moved >= rail { count + 1 } else { count };
            prop_assert_eq!(state.traversal_count(), expected);
        }
    }

    #[test]
    fn trail_never_wraps_past_start(head in 0usize..20, trail_len in 0usize..10) {
        let levels = vec![Rgb::new(50, 50, 50); trail_len + 1];
        let mut frame = Framebuffer::new(20);
        draw_trail(&mut frame, head, &levels);

        let lit = frame.pixels().iter().filter(|p| **p != Rgb::new(0, 0, 0)).count();
        prop_assert_eq!(lit, (trail_len + 1).min(head + 1));
        for index in head + 1..20 {
            prop_assert_eq!(frame.pixels()[index], Rgb::new(0, 0, 0));
        }
    }
}
