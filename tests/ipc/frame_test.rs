/*!
 * Frame Reassembly Properties
 */

use procthread::ipc::{encode_frame, FrameBuffer};
use proptest::prelude::*;

proptest! {
    #[test]
    fn frames_survive_arbitrary_chunking(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..512), 1..16),
        cut in 1usize..97,
    ) {
        let wire: Vec<u8> = payloads.iter().flat_map(|p| encode_frame(p)).collect();
        let mut buffer = FrameBuffer::new(1024);
        let mut decoded = Vec::new();

        for chunk in wire.chunks(cut) {
            buffer.extend_from_slice(chunk);
            while let Some(frame) = buffer.next_frame().unwrap() {
                decoded.push(frame.to_vec());
            }
        }

        prop_assert_eq!(decoded, payloads);
        prop_assert!(buffer.is_empty());
        prop_assert!(buffer.finish().is_ok());
    }
}
