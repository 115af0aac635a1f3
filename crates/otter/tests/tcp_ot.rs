//! End-to-end OT extension over a localhost TCP channel.
use bitvec::vec::BitVec;
use otter::base_ot;
use otter::ot_ext::{ExtOTMsg, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ot_extension_over_tcp() {
    let num_ots = 256;
    let (mut server, mut client) = net_channel::tcp::local_pair::<net_channel::Receiver<ExtOTMsg>>()
        .await
        .expect("establishing local tcp pair");

    let mut rng = StdRng::seed_from_u64(123);
    let choices: BitVec = (0..num_ots).map(|_| rng.gen::<bool>()).collect();
    let choices_clone = choices.clone();

    let sender_fut = async {
        let (tx, mut rx) = net_channel::sub_channel(&mut server.sender, &mut server.receiver)
            .await
            .expect("establishing sub channel");
        let mut sender = Sender::new(base_ot::Receiver);
        let mut rng = StdRng::seed_from_u64(42);
        sender
            .send_random(num_ots, &mut rng, &tx, &mut rx)
            .await
            .expect("extension sender failed")
    };
    let receiver_fut = async {
        let (tx, mut rx) = net_channel::sub_channel(&mut client.sender, &mut client.receiver)
            .await
            .expect("establishing sub channel");
        let mut receiver = Receiver::new(base_ot::Sender);
        let mut rng = StdRng::seed_from_u64(42 * 42);
        receiver
            .receive_random(&choices_clone, &mut rng, &tx, &mut rx)
            .await
            .expect("extension receiver failed")
    };
    let (key_pairs, keys) = tokio::join!(sender_fut, receiver_fut);

    assert_eq!(key_pairs.len(), num_ots);
    assert_eq!(keys.len(), num_ots);
    for ((pair, key), choice) in key_pairs.into_iter().zip(keys).zip(choices) {
        assert_eq!(key, pair[choice as usize]);
    }
    assert!(server.bytes_sent.get() > 0);
    assert!(server.bytes_received.get() > 0);
}
