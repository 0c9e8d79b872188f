//! Page and page-sequence containers returned by the pager.

// self
use crate::{_prelude::*, paging::PageLinks};

/// One decoded response of a paginated collection.
#[derive(Clone, Debug)]
pub struct Page<T> {
	/// URI the page was fetched from.
	pub uri: Url,
	/// Decoded body.
	pub data: T,
	/// Links advertised by the response.
	pub links: PageLinks,
}

/// Pages of one fetch-all call, in the order the `next` links dictated.
#[derive(Clone, Debug)]
pub struct PageSequence<T>(Vec<Page<T>>);
impl<T> PageSequence<T> {
	/// Number of pages.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no page was fetched.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterator over the pages in fetch order.
	pub fn iter(&self) -> impl Iterator<Item = &Page<T>> {
		self.0.iter()
	}

	/// Consumes the sequence, returning the pages.
	pub fn into_pages(self) -> Vec<Page<T>> {
		self.0
	}

	pub(crate) fn push(&mut self, page: Page<T>) {
		self.0.push(page);
	}
}
impl<T> PageSequence<T>
where
	T: IntoIterator,
{
	/// Concatenates the items of every page, preserving page order.
	pub fn into_items(self) -> Vec<T::Item> {
		self.0.into_iter().flat_map(|page| page.data).collect()
	}
}
impl<T> Default for PageSequence<T> {
	fn default() -> Self {
		Self(Vec::new())
	}
}
impl<T> IntoIterator for PageSequence<T> {
	type IntoIter = std::vec::IntoIter<Page<T>>;
	type Item = Page<T>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}
