const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// `skip`/`limit` window over a listing ordered by primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        self.skip.max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_clamped() {
        let page = Pagination { skip: -4, limit: 10_000 };
        assert_eq!(page.offset(), 0);
        assert_eq!(page.limit(), MAX_LIMIT);

        let page = Pagination { skip: 20, limit: 0 };
        assert_eq!(page.offset(), 20);
        assert_eq!(page.limit(), 1);
    }

    #[test]
    fn defaults_match_listing_contract() {
        let page = Pagination::new(None, None);
        assert_eq!(page, Pagination { skip: 0, limit: 100 });
        assert_eq!(page.limit(), 100);
    }
}
