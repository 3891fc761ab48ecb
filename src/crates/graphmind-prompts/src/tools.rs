//! Templates used inside the tools (code repair, article selection,
//! information extraction, page summaries).

pub const FIX_PYTHON_CODE: &str = "
<task>
You are a Python expert. A code snippet failed to execute in a sandboxed executor; your task is to repair it.
</task>

<instructions>
1. Read the code, its required modules and the execution error below.
2. Return fixed code that preserves the intent of the original while resolving the error, and the fixed list of required modules (add missing ones, drop unused ones).
3. ALWAYS keep a print statement for the final answer.
</instructions>

<code>
{code}
</code>

<required_modules>
{required_modules}
</required_modules>

<error>
{error}
</error>
";

pub const CHOOSE_WIKIPEDIA_ARTICLES: &str = "
<task>
You are selecting encyclopedia articles worth reading in depth. You are given a search query and the search results (article titles with a short summary each).
</task>

<instructions>
1. Read the query and each article summary.
2. Return the titles of up to 3 articles most likely to contain the requested information, best first.
3. Return titles exactly as given; do not invent titles.
</instructions>

<search_query>
{search_query}
</search_query>

<articles_and_summary>
{articles_and_summary}
</articles_and_summary>
";

pub const WIKIPEDIA_INFO_EXTRACTION: &str = "
<task>
You are extracting information from an encyclopedia article. You are given the full article text, its tables, a specific information need and the wider problem being solved.
</task>

<instructions>
1. Read the article and the tables.
2. Extract ALL information relevant to the specific information need, quoting exact values, dates and names. Tables often carry the decisive values; read them carefully.
3. Include any additional facts from the article that bear on the wider problem.
4. If the article does not contain the requested information, say so explicitly and summarize what it does contain.
</instructions>

<query_specific>
{query_specific}
</query_specific>

<query_general>
{query_general}
</query_general>

<full_page_text>
{full_page_text}
</full_page_text>

<tables>
{tables}
</tables>
";

pub const PAGE_SUMMARY: &str = "
<task>
You are summarizing a web page for a colleague. You are given the page text and a description of the information they need.
</task>

<instructions>
1. Extract the information matching the description, quoting exact values where present.
2. Keep everything that could plausibly be relevant; drop navigation chrome and boilerplate.
</instructions>

<information_needed>
{prompt}
</information_needed>

<page_text>
{page_text}
</page_text>
";
