use std::fmt;

/// Marketplaces we build search links for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marketplace {
    Amazon,
    Rakuten,
}

impl Marketplace {
    pub const ALL: &'static [Marketplace] = &[Marketplace::Amazon, Marketplace::Rakuten];

    /// Button label shown on the reply card.
    pub fn label(self) -> &'static str {
        match self {
            Marketplace::Amazon => "Amazonで検索",
            Marketplace::Rakuten => "楽天市場で検索",
        }
    }

    fn search_url(self, encoded_keyword: &str) -> String {
        match self {
            Marketplace::Amazon => {
                format!("https://www.amazon.co.jp/s?k={}", encoded_keyword)
            }
            Marketplace::Rakuten => {
                format!("https://search.rakuten.co.jp/search/mall/{}", encoded_keyword)
            }
        }
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marketplace::Amazon => write!(f, "amazon"),
            Marketplace::Rakuten => write!(f, "rakuten"),
        }
    }
}

/// A single marketplace search URL, ready to become a URI action button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLink {
    pub marketplace: Marketplace,
    pub url: String,
}

/// Build one search link per marketplace. Internal whitespace runs are
/// collapsed to a single `+` before percent-encoding, matching marketplace
/// query conventions. Callers guarantee a non-empty keyword; an empty one
/// yields no links rather than a broken URL.
pub fn build_links(keyword: &str) -> Vec<SearchLink> {
    let joined = keyword.split_whitespace().collect::<Vec<_>>().join("+");
    if joined.is_empty() {
        return Vec::new();
    }
    let encoded = urlencoding::encode(&joined);

    Marketplace::ALL
        .iter()
        .map(|&marketplace| SearchLink {
            marketplace,
            url: marketplace.search_url(&encoded),
        })
        .collect()
}
