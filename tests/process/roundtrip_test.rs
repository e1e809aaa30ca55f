/*!
 * Result Round Trips
 * A child's return value reaches the parent unchanged
 */

use crate::strategies;
use procthread::{spawn, Json, ThreadBuilder};
use proptest::prelude::*;
use serial_test::serial;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    #[serial]
    fn returned_values_survive_the_process_boundary(value in strategies::value()) {
        let expected = value.clone();
        let mut worker = spawn(move || value).unwrap();
        worker.join().unwrap();

        prop_assert_eq!(worker.exit_status().unwrap(), 0);
        prop_assert_eq!(worker.result().unwrap(), Some(&expected));
        worker.dispose().unwrap();
    }

    #[test]
    #[serial]
    fn returned_text_survives_json_results(text in ".{0,512}", bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        let expected = (text.clone(), bytes.clone());
        let mut worker = ThreadBuilder::new()
            .codec(Json)
            .spawn(move || (text, bytes))
            .unwrap();
        worker.join().unwrap();

        prop_assert_eq!(worker.result().unwrap(), Some(&expected));
        worker.dispose().unwrap();
    }
}
