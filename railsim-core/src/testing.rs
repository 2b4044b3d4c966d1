//! Fixtures and validation harness shared by unit tests

use crate::imports::*;
use crate::track::{Infra, InfraBuilder, PathLocation, RawInfra, TrainPath};
use crate::utils::IdAllocator;

/// Installs a test logger once; later calls are no-ops
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Known-good, fake and known-bad instances of a validated type
pub trait Cases: Sized + Valid + ObjState {
    fn real_cases() -> Vec<Self> {
        vec![Self::valid()]
    }
    fn fake_cases() -> Vec<Self> {
        vec![]
    }
    fn invalid_cases() -> Vec<Self> {
        vec![]
    }
}

/// Generates tests checking every case of `$T` against its expected validation outcome
macro_rules! check_cases {
    ($T:ty) => {
        #[test]
        fn check_real_cases() {
            for case in <$T as $crate::testing::Cases>::real_cases() {
                assert!($crate::validate::ObjState::is_real(&case), "{case:?}");
                if let Err(errs) = $crate::validate::ObjState::validate(&case) {
                    panic!("{case:?}\n{errs}");
                }
            }
        }

        #[test]
        fn check_fake_cases() {
            for case in <$T as $crate::testing::Cases>::fake_cases() {
                assert!($crate::validate::ObjState::is_fake(&case), "{case:?}");
                assert!($crate::validate::ObjState::validate(&case).is_ok(), "{case:?}");
            }
        }

        #[test]
        fn check_invalid_cases() {
            for case in <$T as $crate::testing::Cases>::invalid_cases() {
                assert!($crate::validate::ObjState::validate(&case).is_err(), "{case:?}");
            }
        }
    };
}
pub(crate) use check_cases;

/// Three chained tracks of 2000 m, 1000 m and 2000 m, with operational points carrying uic
/// codes 1, 2 and 3
pub fn small_raw_infra() -> RawInfra {
    let mut builder = InfraBuilder::new("small", IdAllocator::new("track"));
    let t0 = builder.add_track(2000.0 * uc::M);
    let t1 = builder.add_track(1000.0 * uc::M);
    let t2 = builder.add_track(2000.0 * uc::M);
    builder.add_buffer_stop(t0, 0.0 * uc::M);
    builder.add_detector(t0, 1000.0 * uc::M);
    builder.add_detector(t1, 500.0 * uc::M);
    builder.add_detector(t2, 1000.0 * uc::M);
    builder.add_buffer_stop(t2, 2000.0 * uc::M);
    builder.chain(&[t0, t1, t2]);
    builder.add_operational_point("op.west", Some(1), &[(t0, 100.0 * uc::M)]);
    builder.add_operational_point("op.mid", Some(2), &[(t1, 500.0 * uc::M)]);
    builder.add_operational_point("op.east", Some(3), &[(t2, 1900.0 * uc::M)]);
    builder.build()
}

pub fn small_infra() -> Infra {
    Infra::load(small_raw_infra()).unwrap()
}

/// Path between two `(track, offset in m)` locations of `raw`
pub fn path_between(raw: RawInfra, from: (&str, f64), to: (&str, f64)) -> TrainPath {
    let infra = Infra::load(raw).unwrap();
    let loc = |id: &str, (track, offset): (&str, f64)| {
        PathLocation::new(
            id,
            vec![infra.resolve_location(track, offset * uc::M).unwrap()],
        )
    };
    TrainPath::find(&infra, &[loc("from", from), loc("to", to)]).unwrap()
}
