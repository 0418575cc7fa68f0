//! Page envelope for paged listings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for page construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    #[error("Current page must be greater than zero")]
    InvalidCurrentPage,
}

/// A single page of a listing, with the bookkeeping clients need to walk
/// the remaining pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerPage<T> {
    pub elements: Vec<T>,
    pub total_elements: i64,
    pub page_size: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub next_page: i64,
}

impl<T> ServerPage<T> {
    /// Builds a page envelope.
    ///
    /// `total_pages` rounds up; `next_page` stays on the current page when
    /// it is the last one. Pages are numbered from 1. A negative total
    /// counts as zero.
    pub fn new(
        elements: Vec<T>,
        total_elements: i64,
        current_page: i64,
        page_size: i64,
    ) -> Result<Self, PageError> {
        if page_size <= 0 {
            return Err(PageError::InvalidPageSize);
        }
        if current_page <= 0 {
            return Err(PageError::InvalidCurrentPage);
        }

        let total_elements = total_elements.max(0);
        let total_pages = (total_elements + page_size - 1) / page_size;
        let next_page = if total_pages == current_page {
            current_page
        } else {
            current_page + 1
        };

        Ok(Self {
            elements,
            total_elements,
            page_size,
            current_page,
            total_pages,
            next_page,
        })
    }

    /// Whether this is the final page.
    pub fn is_last(&self) -> bool {
        self.current_page >= self.total_pages
    }

    /// Maps the page elements, keeping the envelope intact.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ServerPage<U> {
        ServerPage {
            elements: self.elements.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            page_size: self.page_size,
            current_page: self.current_page,
            total_pages: self.total_pages,
            next_page: self.next_page,
        }
    }
}
