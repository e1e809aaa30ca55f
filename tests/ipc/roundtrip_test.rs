/*!
 * Channel Round Trips
 * Whatever goes into a channel comes out unchanged
 */

use crate::strategies;
use procthread::{Channel, Config, Json, Value};
use proptest::prelude::*;

proptest! {
    #[test]
    fn values_survive_bincode_channel(values in prop::collection::vec(strategies::value(), 1..8)) {
        let channel: Channel<Value> = Channel::new().unwrap();
        for value in &values {
            channel.send(value).unwrap();
        }
        for value in &values {
            prop_assert_eq!(&channel.receive_blocking().unwrap(), value);
        }
        prop_assert_eq!(channel.try_receive().unwrap(), None);
    }

    #[test]
    fn text_and_bytes_survive_json_channel(
        text in ".{0,256}",
        bytes in prop::collection::vec(any::<u8>(), 0..4096),
    ) {
        let channel: Channel<(String, Vec<u8>), Json> =
            Channel::with_codec(&Config::testing(), Json).unwrap();
        let sent = (text, bytes);
        channel.send(&sent).unwrap();
        prop_assert_eq!(channel.receive(false).unwrap(), Some(sent));
    }

    #[test]
    fn raw_bytes_survive_nonblocking_receive(bytes in prop::collection::vec(any::<u8>(), 0..16384)) {
        let channel: Channel<Vec<u8>> = Channel::new().unwrap();
        prop_assert!(channel.try_send(&bytes).unwrap());
        prop_assert_eq!(channel.try_receive().unwrap(), Some(bytes));
    }
}
