use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page (1..=100)
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn resolve(page: Option<u32>, per_page: Option<u32>) -> Self {
        Page {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

impl From<&PageQuery> for Page {
    fn from(q: &PageQuery) -> Self {
        Page::resolve(q.page, q.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let p = Page::resolve(None, None);
        assert_eq!(p, Page { page: 1, per_page: DEFAULT_PER_PAGE });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let p = Page::resolve(Some(0), Some(10_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.per_page, MAX_PER_PAGE);

        assert_eq!(Page::resolve(Some(3), Some(0)).per_page, 1);
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(Page::resolve(Some(3), Some(25)).offset(), 50);
    }
}
