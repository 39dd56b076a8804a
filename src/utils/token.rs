use rand::{distributions::Alphanumeric, Rng};

/// Uppercase ASCII letters and digits drawn from `rng`.
pub fn random_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn code_is_uppercase_alphanumeric() {
        let mut rng = StdRng::seed_from_u64(42);
        let code = random_code(&mut rng, 9);
        assert_eq!(code.len(), 9);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
