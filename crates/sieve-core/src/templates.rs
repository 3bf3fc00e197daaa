//! Canned analysis scripts
//!
//! Each template is a complete Python program with one placeholder for the
//! input path. The path is embedded as a JSON string literal, which Python
//! reads as an equivalent string literal, so quotes and backslashes in the
//! path cannot break out of it.

const PATH_PLACEHOLDER: &str = "__SIEVE_INPUT_PATH__";

const LOG_ANALYSIS: &str = r##"import json
import re
from collections import Counter, defaultdict
from datetime import datetime

INPUT_PATH = __SIEVE_INPUT_PATH__
LINE = re.compile(r'(\S+) - - \[(.*?)\] "(\S+) (\S+) (\S+)" (\d+) (\d+) "(.*?)" "(.*?)"')


def pct(part, total):
    return (part / total * 100) if total else 0.0


def agent_class(agent):
    lowered = agent.lower()
    if 'bot' in lowered:
        return 'bot'
    if 'curl' in lowered:
        return 'curl'
    if 'Mozilla' in agent:
        return 'browser'
    return 'other'


def summarize(path):
    statuses = Counter()
    endpoints = Counter()
    ips = Counter()
    methods = Counter()
    agents = Counter()
    hourly = defaultdict(int)
    server_errors = []
    client_errors = Counter()
    total = 0
    total_bytes = 0

    with open(path, 'r', errors='replace') as handle:
        for line in handle:
            match = LINE.match(line)
            if not match:
                continue
            ip, stamp, method, endpoint, _proto, status, size, _referer, agent = match.groups()
            status = int(status)
            total += 1
            total_bytes += int(size)
            statuses[status] += 1
            endpoints[endpoint] += 1
            ips[ip] += 1
            methods[method] += 1
            agents[agent_class(agent)] += 1
            if 500 <= status < 600:
                server_errors.append({'endpoint': endpoint, 'status': status, 'ip': ip, 'timestamp': stamp})
            elif 400 <= status < 500:
                client_errors[endpoint] += 1
            try:
                hour = datetime.strptime(stamp, '%d/%b/%Y:%H:%M:%S %z').strftime('%H:00')
                hourly[hour] += 1
            except ValueError:
                pass

    rate_5xx = pct(len(server_errors), total)
    rate_4xx = pct(sum(client_errors.values()), total)

    recommendations = []
    if rate_5xx > 5:
        recommendations.append('HIGH: %.1f%% of requests are server errors (5xx). Investigate backend issues.' % rate_5xx)
    if rate_4xx > 20:
        recommendations.append('MEDIUM: %.1f%% of requests are client errors (4xx). Check for broken links or API changes.' % rate_4xx)
    if statuses.get(404, 0) > total * 0.1:
        recommendations.append('MEDIUM: %d requests are 404 Not Found. Review missing resources.' % statuses[404])
    if not recommendations:
        recommendations.append('No critical issues detected.')

    return {
        'overview': {
            'total_requests': total,
            'total_bytes_transferred': total_bytes,
            'avg_response_size': total_bytes // total if total else 0,
            'success_rate': '%.1f%%' % pct(statuses.get(200, 0), total),
            'error_rate_5xx': '%.1f%%' % rate_5xx,
            'error_rate_4xx': '%.1f%%' % rate_4xx,
        },
        'status_codes': {str(code): n for code, n in statuses.most_common()},
        'top_endpoints': dict(endpoints.most_common(10)),
        'http_methods': dict(methods),
        'top_ips': dict(ips.most_common(10)),
        'user_agents': dict(agents),
        'errors_5xx': {'count': len(server_errors), 'details': server_errors[:5]},
        'errors_4xx': {'count': sum(client_errors.values()), 'top_endpoints': dict(client_errors.most_common(5))},
        'hourly_traffic': dict(sorted(hourly.items())),
        'recommendations': recommendations,
    }


try:
    report = summarize(INPUT_PATH)
except FileNotFoundError:
    report = {
        'error': 'Log file not found: %s' % INPUT_PATH,
        'suggestion': 'Provide the path to an nginx access log in combined format',
    }
except Exception as exc:
    report = {'error': 'Error analyzing logs: %s' % exc}

print(json.dumps(report, indent=2))
"##;

const CSV_ANALYSIS: &str = r##"import csv
import json

INPUT_PATH = __SIEVE_INPUT_PATH__


def as_number(value):
    try:
        return float(value)
    except ValueError:
        return None


def summarize(path):
    with open(path, 'r', newline='', errors='replace') as handle:
        reader = csv.reader(handle)
        header = next(reader, None)
        if header is None:
            return {'rows': 0, 'columns': []}

        stats = [
            {'name': name, 'non_empty': 0, 'values': set(), 'numeric': True, 'min': None, 'max': None, 'sum': 0.0}
            for name in header
        ]
        rows = 0
        for row in reader:
            rows += 1
            for index, column in enumerate(stats):
                value = row[index].strip() if index < len(row) else ''
                if not value:
                    continue
                column['non_empty'] += 1
                column['values'].add(value)
                if not column['numeric']:
                    continue
                number = as_number(value)
                if number is None:
                    column['numeric'] = False
                    continue
                column['sum'] += number
                column['min'] = number if column['min'] is None else min(column['min'], number)
                column['max'] = number if column['max'] is None else max(column['max'], number)

    columns = []
    for column in stats:
        entry = {
            'name': column['name'],
            'non_empty': column['non_empty'],
            'distinct': len(column['values']),
        }
        if column['numeric'] and column['non_empty']:
            entry['min'] = column['min']
            entry['max'] = column['max']
            entry['mean'] = column['sum'] / column['non_empty']
        columns.append(entry)

    return {'rows': rows, 'columns': columns}


try:
    report = summarize(INPUT_PATH)
except FileNotFoundError:
    report = {
        'error': 'CSV file not found: %s' % INPUT_PATH,
        'suggestion': 'Provide the path to a comma-separated file with a header row',
    }
except Exception as exc:
    report = {'error': 'Error analyzing CSV: %s' % exc}

print(json.dumps(report, indent=2))
"##;

/// Nginx combined-format access log summary
pub fn log_analysis(log_path: &str) -> String {
    render(LOG_ANALYSIS, log_path)
}

/// Per-column CSV summary
pub fn csv_analysis(csv_path: &str) -> String {
    render(CSV_ANALYSIS, csv_path)
}

fn render(template: &str, path: &str) -> String {
    // Serializing a &str cannot fail
    let literal = serde_json::Value::from(path).to_string();
    template.replacen(PATH_PLACEHOLDER, &literal, 1)
}
