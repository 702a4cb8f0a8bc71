use incidents_common::{AddressSort, AddressSummary, IncidentCategory, Page, SortOrder};

use crate::report::AddressReport;

/// Render the home page: address search plus login state.
pub fn render_home(email: Option<&str>) -> String {
    let content = r#"<div class="container">
    <h2 style="margin-bottom:16px;">Look up an address</h2>
    <form id="lookup" class="card">
        <input type="text" id="address" name="address" placeholder="123 MAIN ST" required autofocus>
        <button type="submit" class="btn">Search</button>
    </form>
    <p style="font-size:13px;color:#888;">Or <a href="/browse">browse all addresses</a>.</p>
</div>
<script>
document.getElementById('lookup').addEventListener('submit', function (e) {
    e.preventDefault();
    const address = document.getElementById('address').value.trim();
    if (address) {
        window.location = '/address/' + encodeURIComponent(address);
    }
});
</script>"#;

    build_page("Home", email, content)
}

/// Render the incident summary for one address.
pub fn render_address(report: &AddressReport, email: Option<&str>) -> String {
    let header_cells: String = report
        .timeframes
        .iter()
        .map(|days| format!(r#"<th style="text-align:right;">{}</th>"#, window_label(*days)))
        .collect();

    let count_rows: String = IncidentCategory::ALL
        .iter()
        .map(|category| {
            let counts = report.counts.get(*category);
            let cells: String = report
                .timeframes
                .iter()
                .map(|days| {
                    let n = counts.get(days).copied().unwrap_or(0);
                    format!(r#"<td style="text-align:right;">{n}</td>"#)
                })
                .collect();
            format!("<tr><td>{}</td>{cells}</tr>", category.label())
        })
        .collect();

    let reason_sections: String = IncidentCategory::ALL
        .iter()
        .map(|category| {
            let per_window = report.top_reasons.get(*category);
            let columns: String = report
                .timeframes
                .iter()
                .map(|days| {
                    let items = per_window.get(days).map(Vec::as_slice).unwrap_or(&[]);
                    let list = if items.is_empty() {
                        r#"<p class="muted">None</p>"#.to_string()
                    } else {
                        let lis: String = items
                            .iter()
                            .map(|r| {
                                format!(
                                    "<li>{} <span class=\"muted\">({})</span></li>",
                                    html_escape(&r.reason),
                                    r.count
                                )
                            })
                            .collect();
                        format!("<ol>{lis}</ol>")
                    };
                    format!("<div><h4>{}</h4>{list}</div>", window_label(*days))
                })
                .collect();
            format!(
                r#"<div class="card"><h3>Top {} reasons</h3><div class="reason-grid">{columns}</div></div>"#,
                category.label().to_lowercase()
            )
        })
        .collect();

    let businesses = if report.business_names.is_empty() {
        r#"<p class="muted">No business licenses on record.</p>"#.to_string()
    } else {
        let rows: String = report
            .business_names
            .iter()
            .zip(report.business_types.iter())
            .map(|(name, kind)| {
                format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    html_escape(name),
                    html_escape(kind)
                )
            })
            .collect();
        format!(
            "<table><thead><tr><th>Business</th><th>Type</th></tr></thead><tbody>{rows}</tbody></table>"
        )
    };

    let content = format!(
        r#"<div class="container">
    <h2 style="margin-bottom:16px;">{address}</h2>
    <div class="card"><h3>Incidents</h3><table><thead><tr><th></th>{header_cells}</tr></thead><tbody>{count_rows}</tbody></table></div>
    {reason_sections}
    <div class="card"><h3>Businesses</h3>{businesses}</div>
</div>"#,
        address = html_escape(&report.address),
    );

    build_page(&report.address, email, &content)
}

/// Render one page of the address directory.
pub fn render_browse(
    page: &Page<AddressSummary>,
    sort: AddressSort,
    order: SortOrder,
    email: Option<&str>,
) -> String {
    let rows: String = if page.items.is_empty() {
        r#"<tr><td colspan="3" class="muted" style="text-align:center;padding:24px;">No addresses yet.</td></tr>"#
            .to_string()
    } else {
        page.items
            .iter()
            .map(|s| {
                format!(
                    r#"<tr><td><a href="/address/{href}">{address}</a></td><td style="text-align:right;">{fire}</td><td style="text-align:right;">{police}</td></tr>"#,
                    href = urlencoding::encode(&s.address),
                    address = html_escape(&s.address),
                    fire = s.fire_count,
                    police = s.police_count,
                )
            })
            .collect()
    };

    let header = |key: AddressSort, label: &str| {
        // Clicking the active column flips its direction.
        let next = if key == sort { order.flipped() } else { SortOrder::Asc };
        let marker = match (key == sort, order) {
            (true, SortOrder::Asc) => " &#9650;",
            (true, SortOrder::Desc) => " &#9660;",
            (false, _) => "",
        };
        format!(
            r#"<a href="/browse?sort={}&amp;order={}">{label}</a>{marker}"#,
            key.column(),
            order_param(next),
        )
    };

    let mut pager = String::new();
    if page.has_prev() {
        pager.push_str(&browse_link(page.page - 1, sort, order, "&larr; Previous"));
    }
    if page.pages() > 1 {
        pager.push_str(&format!(
            r#"<span class="muted">Page {} of {}</span>"#,
            page.page,
            page.pages()
        ));
    }
    if page.has_next() {
        pager.push_str(&browse_link(page.page + 1, sort, order, "Next &rarr;"));
    }

    let content = format!(
        r#"<div class="container">
    <h2 style="margin-bottom:16px;">Addresses</h2>
    <div class="card"><table><thead><tr><th>{h_address}</th><th style="text-align:right;">{h_fire}</th><th style="text-align:right;">{h_police}</th></tr></thead><tbody>{rows}</tbody></table></div>
    <div class="pager">{pager}</div>
</div>"#,
        h_address = header(AddressSort::Address, "Address"),
        h_fire = header(AddressSort::FireCount, "Fire incidents"),
        h_police = header(AddressSort::PoliceCount, "Police calls"),
    );

    build_page("Browse", email, &content)
}

pub fn render_not_found(address: &str) -> String {
    let content = format!(
        r#"<div class="container"><div class="card"><h3>Nothing on record</h3><p>No fire or police incidents are recorded at {}.</p></div></div>"#,
        html_escape(address)
    );
    build_page("Not Found", None, &content)
}

pub fn render_unauthorized() -> String {
    let content = r#"<div class="container"><div class="card"><h3>Login required</h3><p>Please <a href="/">sign in</a> to view incident data.</p></div></div>"#;
    build_page("Unauthorized", None, content)
}

pub fn render_error(message: &str) -> String {
    let content = format!(
        r#"<div class="container"><div class="card"><h3>Something went wrong</h3><p>{}</p></div></div>"#,
        html_escape(message)
    );
    build_page("Error", None, &content)
}

pub fn render_maintenance() -> String {
    let content = r#"<div class="container"><div class="card"><h3>Down for maintenance</h3><p>We'll be back shortly.</p></div></div>"#;
    build_page("Maintenance", None, content)
}

// --- Helpers ---

fn window_label(days: u32) -> String {
    match days {
        1 => "Last day".to_string(),
        365 => "Last year".to_string(),
        d => format!("Last {d} days"),
    }
}

fn order_param(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "asc",
        SortOrder::Desc => "desc",
    }
}

fn browse_link(page: u32, sort: AddressSort, order: SortOrder, label: &str) -> String {
    format!(
        r#"<a class="btn" href="/browse?page={page}&amp;sort={}&amp;order={}">{label}</a>"#,
        sort.column(),
        order_param(order),
    )
}

fn session_nav(email: Option<&str>) -> String {
    match email {
        Some(email) => format!(
            r#"<span class="who">{}</span><form method="POST" action="/log-out" style="display:inline;"><button type="submit" class="link">Log out</button></form>"#,
            html_escape(email)
        ),
        None => r#"<button type="button" class="link" id="login">Log in</button>
<script src="https://login.persona.org/include.js"></script>
<script>
document.getElementById('login').addEventListener('click', function () { navigator.id.request(); });
navigator.id.watch({
    loggedInUser: null,
    onlogin: function (assertion) {
        fetch('/log-in', {
            method: 'POST',
            headers: { 'Content-Type': 'application/x-www-form-urlencoded' },
            body: 'assertion=' + encodeURIComponent(assertion),
        }).then(function (r) { if (r.ok) { window.location.reload(); } else { navigator.id.logout(); } });
    },
    onlogout: function () {},
});
</script>"#
            .to_string(),
    }
}

fn build_page(title: &str, email: Option<&str>, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Incident Lookup</title>
<style>
*{{margin:0;padding:0;box-sizing:border-box;}}
body{{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}}
.header{{background:#1a1a1a;color:#fff;padding:12px 24px;display:flex;align-items:center;justify-content:space-between;}}
.header h1{{font-size:18px;font-weight:600;}}
.header nav a,.header .who{{color:#ccc;text-decoration:none;margin-left:20px;font-size:14px;}}
.header nav a:hover{{color:#fff;}}
.container{{max-width:960px;margin:0 auto;padding:24px;}}
.card{{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:16px;margin-bottom:12px;}}
.card h3{{font-size:16px;margin-bottom:8px;}}
.card h4{{font-size:13px;color:#666;margin-bottom:4px;}}
table{{width:100%;font-size:14px;border-collapse:collapse;}}
th,td{{padding:4px 6px;text-align:left;border-bottom:1px solid #f0f0f0;}}
.reason-grid{{display:grid;grid-template-columns:repeat(4,1fr);gap:12px;font-size:13px;}}
.reason-grid ol{{padding-left:18px;}}
.muted{{color:#888;font-size:12px;}}
.btn{{display:inline-block;padding:6px 16px;background:#0066cc;color:#fff;border:none;border-radius:4px;text-decoration:none;font-size:13px;cursor:pointer;}}
.btn:hover{{background:#004499;}}
.link{{background:none;border:none;color:#ccc;font-size:14px;margin-left:20px;cursor:pointer;}}
.pager{{display:flex;gap:12px;align-items:center;}}
#lookup{{display:flex;gap:8px;}}
#lookup input{{flex:1;padding:8px;border:1px solid #ccc;border-radius:4px;font-size:14px;}}
</style>
</head>
<body>
<div class="header">
    <h1>Incident Lookup</h1>
    <nav><a href="/">Search</a><a href="/browse">Browse</a>{session}</nav>
</div>
{content}
</body>
</html>"#,
        title = html_escape(title),
        session = session_nav(email),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn window_labels() {
        assert_eq!(window_label(7), "Last 7 days");
        assert_eq!(window_label(365), "Last year");
    }

    #[test]
    fn browse_links_encode_addresses() {
        let page = Page {
            items: vec![AddressSummary {
                address: "1 SO VAN NESS AV".into(),
                fire_count: 2,
                police_count: 3,
            }],
            page: 1,
            per_page: 20,
            total: 1,
        };
        let html = render_browse(&page, AddressSort::FireCount, SortOrder::Desc, None);
        assert!(html.contains(r#"href="/address/1%20SO%20VAN%20NESS%20AV""#));
        // Active column links to the flipped direction.
        assert!(html.contains("sort=fire_count&amp;order=asc"));
        assert!(!html.contains("Next &rarr;"));
    }

    #[test]
    fn signed_in_email_is_shown() {
        let html = render_home(Some("pat@example.org"));
        assert!(html.contains("pat@example.org"));
        assert!(html.contains(r#"action="/log-out""#));
        assert!(!render_home(None).contains("/log-out"));
    }
}
