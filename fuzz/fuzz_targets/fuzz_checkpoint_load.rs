#![no_main]

use libfuzzer_sys::fuzz_target;
use xml_guardian::CheckpointManager;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be refused cleanly: unparsable or corrupt, never
    // a panic, and never a successfully "verified" record unless the hash
    // actually matches.
    let Ok(dir) = tempfile::tempdir() else { return };
    let path = dir.path().join("fuzz_checkpoint_0.json");
    if std::fs::write(&path, data).is_err() {
        return;
    }
    let Ok(manager) = CheckpointManager::new(dir.path(), 0) else {
        return;
    };
    if let Ok(checkpoint) = manager.load(&path) {
        assert!(checkpoint.verify_integrity().unwrap_or(false));
    }
});
