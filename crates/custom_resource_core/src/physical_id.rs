use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::contract::LifecycleEvent;

pub const SUFFIX_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const SUFFIX_LEN: usize = 12;

/// Generates a CloudFormation-like physical id of the form
/// `{StackName}-{LogicalResourceId}-{RANDOM}`.
///
/// The suffix is seeded from the clock. It is unique in practice but must not
/// be treated as a secret.
pub fn new_physical_resource_id(event: &LifecycleEvent) -> String {
    let mut rng = StdRng::seed_from_u64(clock_seed());
    new_physical_resource_id_with_rng(event, &mut rng)
}

pub fn new_physical_resource_id_with_rng(event: &LifecycleEvent, rng: &mut impl Rng) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())]))
        .collect();
    format!(
        "{}-{}-{}",
        stack_short_name(&event.stack_id),
        event.logical_resource_id,
        suffix
    )
}

/// Second `/` segment of a stack ARN (`arn:...:stack/MyStack/guid` -> `MyStack`).
/// Identifiers without a `/` are returned whole.
pub fn stack_short_name(stack_id: &str) -> &str {
    stack_id.split('/').nth(1).unwrap_or(stack_id)
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
