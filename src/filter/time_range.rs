//! Response-time bucketing filter
//!
//! Unlike the text filters this one never rejects a record. It holds a
//! sorted list of millisecond boundaries and maps a record's response time
//! to a bucket label such as `"0..999"`, `"1000..1999"` or `">=2000"`,
//! which a `{r}` placeholder substitutes into the output name.

/// Bucket-label source over the record's response time
///
/// Labels are precomputed at construction so the per-record path is a
/// linear boundary scan plus a borrow. Boundary counts are small (tens at
/// most), so no binary search is warranted.
#[derive(Debug, Clone)]
pub struct ResponseTimeFilter {
    boundaries: Vec<u64>,
    labels: Vec<String>,
}

impl ResponseTimeFilter {
    /// Build a filter from ascending millisecond boundaries
    pub(crate) fn new(boundaries: Vec<u64>) -> std::result::Result<Self, String> {
        if boundaries.is_empty() {
            return Err("at least one boundary is required".to_string());
        }
        if boundaries[0] == 0 {
            return Err("boundaries must be greater than zero".to_string());
        }
        for pair in boundaries.windows(2) {
            if pair[1] <= pair[0] {
                return Err(format!(
                    "boundaries must be strictly ascending, got {} after {}",
                    pair[1], pair[0]
                ));
            }
        }

        let mut labels = Vec::with_capacity(boundaries.len() + 1);
        let mut lower = 0u64;
        for boundary in &boundaries {
            labels.push(format!("{}..{}", lower, boundary - 1));
            lower = *boundary;
        }
        labels.push(format!(">={}", lower));

        Ok(Self { boundaries, labels })
    }

    /// The configured boundaries, ascending
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Label of the first bucket whose upper bound exceeds `millis`
    pub fn bucket_label(&self, millis: u64) -> &str {
        for (index, boundary) in self.boundaries.iter().enumerate() {
            if millis < *boundary {
                return &self.labels[index];
            }
        }
        &self.labels[self.boundaries.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0..999")]
    #[case(500, "0..999")]
    #[case(999, "0..999")]
    #[case(1000, "1000..1999")]
    #[case(1500, "1000..1999")]
    #[case(1999, "1000..1999")]
    #[case(2000, ">=2000")]
    #[case(5000, ">=2000")]
    fn test_bucket_labels(#[case] millis: u64, #[case] expected: &str) {
        let filter = ResponseTimeFilter::new(vec![1000, 2000]).expect("valid boundaries");
        assert_eq!(filter.bucket_label(millis), expected);
    }

    #[test]
    fn test_single_boundary() {
        let filter = ResponseTimeFilter::new(vec![100]).expect("valid boundaries");
        assert_eq!(filter.bucket_label(99), "0..99");
        assert_eq!(filter.bucket_label(100), ">=100");
    }

    #[test]
    fn test_rejects_unsorted_boundaries() {
        let err = ResponseTimeFilter::new(vec![2000, 1000]).expect_err("descending");
        assert!(err.contains("strictly ascending"));

        let err = ResponseTimeFilter::new(vec![1000, 1000]).expect_err("duplicate");
        assert!(err.contains("strictly ascending"));
    }

    #[test]
    fn test_rejects_empty_and_zero() {
        assert!(ResponseTimeFilter::new(vec![]).is_err());
        assert!(ResponseTimeFilter::new(vec![0, 100]).is_err());
    }
}
