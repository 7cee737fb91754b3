//! Lazy pagination over Browse API search results.

use async_stream::try_stream;
use futures::Stream;

use super::EbayError;
use super::client::CatalogApi;
use super::types::ItemSummary;

/// Streams every page of the seller's listings matching `query`, fetching
/// each page only when the consumer asks for it.
///
/// The stream ends after an empty page or a page shorter than `page_size`.
/// A failed fetch surfaces as the final item.
pub fn search_all<'a, C>(
    catalog: &'a C,
    query: &'a str,
    page_size: u32,
) -> impl Stream<Item = Result<Vec<ItemSummary>, EbayError>> + 'a
where
    C: CatalogApi + ?Sized,
{
    try_stream! {
        let mut offset = 0;
        loop {
            let page = catalog.search_page(query, page_size, offset).await?;
            let fetched = u32::try_from(page.items.len()).unwrap_or(u32::MAX);
            if fetched == 0 {
                break;
            }
            yield page.items;
            if fetched < page_size {
                break;
            }
            offset += page_size;
        }
    }
}
