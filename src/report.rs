//! HTML report rendering. The output is the document handed to the external
//! headless-browser printer; this module does no I/O of its own.

use crate::snapshot::{AnalyticsSnapshot, ApiStatus};

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn money(value: f64) -> String {
    format!("${:.2}", value)
}

/// Renders one snapshot into a self-contained printable HTML document.
pub fn render_report(snapshot: &AnalyticsSnapshot, period_label: &str) -> String {
    let mut html = String::with_capacity(4 * 1024);

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "<title>Practice Analytics — {}</title>\n",
        escape(period_label)
    ));
    html.push_str(
        "<style>\n\
         body { font-family: sans-serif; margin: 2rem; color: #1a1a2e; }\n\
         table { border-collapse: collapse; width: 100%; margin-bottom: 1.5rem; }\n\
         th, td { border: 1px solid #ccc; padding: 6px 10px; text-align: left; }\n\
         th { background: #f0f0f5; }\n\
         .banner { background: #fff3cd; border: 1px solid #ffc107; padding: 8px 12px; margin-bottom: 1rem; }\n\
         </style>\n</head>\n<body>\n",
    );

    html.push_str(&format!("<h1>{}</h1>\n", escape(period_label)));
    html.push_str(&format!(
        "<p>{} &mdash; {} (location: {})</p>\n",
        snapshot.query_params.start_date,
        snapshot.query_params.end_date,
        escape(&snapshot.query_params.location)
    ));

    if snapshot.api_status == ApiStatus::Sample {
        html.push_str(
            "<div class=\"banner\">Using sample data &mdash; the practice-management \
             connection was unavailable when this report was generated.</div>\n",
        );
    }

    let summary = &snapshot.summary;
    html.push_str("<h2>Summary</h2>\n<table>\n");
    html.push_str(&format!(
        "<tr><th>Patients</th><td>{}</td><th>Appointments</th><td>{}</td><th>Leads</th><td>{}</td></tr>\n",
        summary.total_patients, summary.total_appointments, summary.total_leads
    ));
    html.push_str(&format!(
        "<tr><th>Revenue</th><td>{}</td><th>Production</th><td>{}</td><th>Net production</th><td>{}</td></tr>\n",
        money(summary.total_revenue),
        money(summary.total_production),
        money(summary.total_net_production)
    ));
    html.push_str(&format!(
        "<tr><th>Profit margin</th><td>{:.1}%</td><th>ROI</th><td>{:.1}%</td><th>No-show rate</th><td>{:.1}%</td></tr>\n",
        summary.profit_margin, summary.roi, summary.no_show_rate
    ));
    html.push_str("</table>\n");

    html.push_str("<h2>Referral sources</h2>\n<table>\n");
    html.push_str("<tr><th></th><th>Digital</th><th>Professional</th><th>Direct</th></tr>\n");
    html.push_str(&format!(
        "<tr><th>Count</th><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        summary.referral_sources.digital,
        summary.referral_sources.professional,
        summary.referral_sources.direct
    ));
    html.push_str(&format!(
        "<tr><th>Conversion</th><td>{}%</td><td>{}%</td><td>{}%</td></tr>\n",
        summary.conversion_rates.digital,
        summary.conversion_rates.professional,
        summary.conversion_rates.direct
    ));
    html.push_str("</table>\n");

    html.push_str("<h2>Locations</h2>\n<table>\n");
    html.push_str(
        "<tr><th>Location</th><th>Patients</th><th>Appointments</th><th>Leads</th>\
         <th>Revenue</th><th>Net production</th><th>Acquisition cost</th></tr>\n",
    );
    for aggregate in snapshot.locations.values() {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&aggregate.name),
            aggregate.patient_count,
            aggregate.appointment_count,
            aggregate.lead_count,
            money(aggregate.revenue_total),
            money(aggregate.net_production_total),
            money(aggregate.acquisition_cost_total)
        ));
    }
    html.push_str("</table>\n");

    let costs = &snapshot.acquisition_cost_breakdown;
    html.push_str("<h2>Acquisition costs</h2>\n<table>\n");
    html.push_str("<tr><th>Manual</th><th>Meta</th><th>Google</th><th>Total</th></tr>\n");
    html.push_str(&format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        money(costs.manual),
        money(costs.meta),
        money(costs.google),
        money(costs.total)
    ));
    html.push_str("</table>\n");

    if !snapshot.trends.monthly.is_empty() {
        html.push_str("<h2>Monthly trend</h2>\n<table>\n");
        html.push_str("<tr><th>Month</th><th>Revenue</th><th>Production</th></tr>\n");
        for bucket in &snapshot.trends.monthly {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&bucket.period_label),
                money(bucket.revenue),
                money(bucket.production)
            ));
        }
        html.push_str("</table>\n");
    }

    html.push_str(&format!(
        "<p><small>Generated {}</small></p>\n</body>\n</html>\n",
        snapshot.last_updated.format("%Y-%m-%d %H:%M UTC")
    ));

    html
}
