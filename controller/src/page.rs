use std::fmt::Write as _;

use icebox_common::StatusSnapshot;

const PAGE_HEADER: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>icebox</title>
  <style>
    body {
      margin: 0;
      padding: 0;
      background-color: #10141a;
      color: #e8eef2;
      font-family: 'Segoe UI', Roboto, sans-serif;
      display: flex;
      flex-direction: column;
      align-items: center;
      justify-content: center;
      height: 100vh;
      text-align: center;
    }
    h2 {
      font-size: 2.5rem;
      margin-bottom: 0.25rem;
    }
    p {
      max-width: 600px;
      line-height: 1.6;
      opacity: 0.8;
    }
  </style>
</head>
<body>
  <h2>icebox</h2>
  <p>Cooler controller</p>
"#;

const PAGE_FOOTER: &str = "</body>\n</html>\n";

const ERROR_BODY: &str = "Error reading temperature<br/>\n";

/// Renders the whole status page as one owned string, always served with
/// status 200. A failed last read replaces the status lines with an error
/// message; the rest of the page stays the same.
pub fn render_status_page(status: &StatusSnapshot) -> String {
    let mut page = String::with_capacity(PAGE_HEADER.len() + PAGE_FOOTER.len() + 512);
    page.push_str(PAGE_HEADER);

    if status.sensor_error {
        page.push_str(ERROR_BODY);
    } else {
        let _ = write!(
            page,
            "<h3>Temperature: {:.2} °C</h3><br/>\n\
             Relay: {relay}<br/>\n\
             Last switched {relay} {elapsed} ago.<br/>\n\
             Switches back ON when {:.2} °C is reached.<br/>\n\
             Switches back OFF when {:.2} °C is reached.<br/>\n",
            status.average_temp_c,
            status.switch_on_above_c,
            status.switch_off_below_c,
            relay = status.relay,
            elapsed = format_elapsed_dhms(status.since_last_switch_ms),
        );
    }

    page.push_str(PAGE_FOOTER);
    page
}

/// Elapsed-time display as days/hours/minutes/seconds; remaining
/// milliseconds are dropped.
pub fn format_elapsed_dhms(ms: u64) -> String {
    const MS_PER_DAY: u64 = 86_400_000;
    const MS_PER_HOUR: u64 = 3_600_000;
    const MS_PER_MINUTE: u64 = 60_000;
    const MS_PER_SECOND: u64 = 1_000;

    let days = ms / MS_PER_DAY;
    let rest = ms % MS_PER_DAY;
    let hours = rest / MS_PER_HOUR;
    let rest = rest % MS_PER_HOUR;
    let minutes = rest / MS_PER_MINUTE;
    let seconds = (rest % MS_PER_MINUTE) / MS_PER_SECOND;

    format!("{days}d {hours}h {minutes}m {seconds}s")
}
