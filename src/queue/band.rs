#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityBand {
    Realtime,
    Crawl,
    Background,
}

impl PriorityBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PriorityBand::Realtime => "realtime",
            PriorityBand::Crawl => "crawl",
            PriorityBand::Background => "background",
        }
    }
}
