use uuid::Uuid;

/// A fresh client secret: a random (v4) UUID drawn from the OS CSPRNG.
pub fn generate_secret() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn secrets_are_pairwise_distinct() {
        let secrets: HashSet<String> = (0..1000).map(|_| generate_secret()).collect();
        assert_eq!(secrets.len(), 1000);
    }

    #[test]
    fn secret_is_random_uuid() {
        let secret = generate_secret();
        let parsed = Uuid::parse_str(&secret).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }
}
