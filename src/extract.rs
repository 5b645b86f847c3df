//! Reads the rendered day view: the date heading and the raw hourly usage
//! labels from the consumption chart. Parsing is left to [`crate::parse`].

use chromiumoxide::Page;
use tracing::debug;

use crate::error::ScraperError;

/// Read the currently displayed day from the consumption-history widget.
///
/// Returns the raw heading text (e.g. "Monday 3 March") and the chart's
/// non-empty bar labels in chronological order. An empty label list is not
/// an error; hours without usage render without a label.
pub async fn read_day(page: &Page) -> Result<(String, Vec<String>), ScraperError> {
    let heading: String = page
        .evaluate(
            r#"
            (function() {
                var el = document.querySelector('.consumption-history .period-dates');
                return el ? el.textContent.trim() : '';
            })()
            "#,
        )
        .await
        .map_err(|e| ScraperError::Navigation(format!("reading day heading: {}", e)))?
        .into_value()
        .unwrap_or_default();

    if heading.is_empty() {
        return Err(ScraperError::ElementNotFound(
            "day heading (.period-dates)".into(),
        ));
    }

    // The chart renders one rect per hour bucket; only buckets with usage
    // carry an aria-label.
    let labels: Vec<String> = page
        .evaluate(
            r#"
            (function() {
                var labels = [];
                var surface = document.querySelector('.consumption-history .recharts-surface');
                if (!surface) {
                    return labels;
                }
                var wrappers = surface.querySelectorAll('.recharts-layer.recharts-customized-wrapper');
                for (var i = 0; i < wrappers.length; i++) {
                    var rects = wrappers[i].querySelectorAll('rect');
                    for (var j = 0; j < rects.length; j++) {
                        var label = rects[j].getAttribute('aria-label');
                        if (label) {
                            labels.push(label);
                        }
                    }
                }
                return labels;
            })()
            "#,
        )
        .await
        .map_err(|e| ScraperError::Navigation(format!("reading usage labels: {}", e)))?
        .into_value()
        .unwrap_or_default();

    debug!("read {} usage labels for {:?}", labels.len(), heading);
    Ok((heading, labels))
}
