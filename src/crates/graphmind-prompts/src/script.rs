//! Script-dialect templates (in-memory directed graph backend).
//!
//! Queries are short scripts evaluated against a `graph` handle. The
//! `<code_documentation>` block below is the contract the evaluation
//! context actually exposes; keep the two in sync.

const CODE_DOCUMENTATION: &str = "
<code_documentation>
When writing a query script, note the following:
- The graph is exposed as the variable `graph`. It is a directed multigraph of labeled nodes with string ids and property maps.
- Available functions:
  graph.add_node(id, label)                      graph.add_node(id, label, #{{key: value, ...}})
  graph.add_edge(source, target, relationship)   graph.add_edge(source, target, relationship, #{{...}})
  graph.remove_node(id)                          graph.remove_edge(source, target)
  graph.has_node(id)                             graph.node_ids()
  graph.node_label(id)                           graph.nodes_with_label(label)
  graph.node_property(id, key)                   graph.node_properties(id)
  graph.set_node_property(id, key, value)
  graph.edges()         // array of #{{source, target, relationship, properties}}
  graph.out_edges(id)   graph.in_edges(id)       graph.neighbors(id)
- A RETRIEVE script must store its answer in a variable called `result`. You must define `result`.
- Correct Syntax and Semantics: close all quotes and parentheses; any variable you use must have been defined before use.
</code_documentation>
";

pub const DEFINE_NEXT_STEP: &str = "
<task>
You are a problem solver using an in-memory directed graph database as a knowledge graph to solve a given problem. Note that the graph may be incomplete.
</task>

<instructions>
Understand the initial problem, the problem nuances, *ALL the existing data* in the graph database and the tools already called.
Can you solve the initial problem using the existing data in the graph database?
- If you can solve the initial problem with the existing data by writing a script that extracts information from the graph, return the script (using the documentation below) and set query_type to RETRIEVE. Watch out for the correct conditions and relationships as required by the initial problem. Retrieve only if the data is sufficient to solve the problem in a zero-shot manner.
- Remember, if the solution is contained in the graph you must write a script to retrieve it. If you already know the solution and don't need to query the graph, write a script that sets the variable `result` equal to the answer.
- If the existing data is insufficient to solve the problem, return why you could not solve the initial problem and what is missing for you to solve it, and set query_type to INSERT.
- Do NOT make up data. Do NOT assume anything. If you are missing a piece of information, choose to INSERT.
- If you only have partial information (e.g. calculations are still needed), continue to INSERT more data.
</instructions>
{code_documentation}
<examples>
<example_retrieve>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing Nodes:
  Label: Author
    [{{id:A1, properties:{{\"name\":\"J.K. Rowling\"}}}}, {{id:A2, properties:{{\"name\":\"George R.R. Martin\"}}}}]
  Label: Book
    [{{id:B1, properties:{{\"title\":\"Harry Potter and the Philosopher's Stone\"}}}}, {{id:B3, properties:{{\"title\":\"A Game of Thrones\"}}}}]
Existing Relationships:
  Label: wrote
    [{{source: {{id: A1}}, target: {{id: B1}}, properties: {{}}}}, {{source: {{id: A2}}, target: {{id: B3}}, properties: {{}}}}]
Solution:
query: '
let titles = [];
for edge in graph.out_edges(\"A1\") {{
    titles.push(graph.node_property(edge.target, \"title\"));
}}
let result = titles;
'
query_type: RETRIEVE
</example_retrieve>
<example_insert>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing Nodes:
  Label: Author
    [{{id:A2, properties:{{\"name\":\"George R.R. Martin\"}}}}]
Existing Relationships:
  Label: wrote
    [{{source: {{id: A2}}, target: {{id: B3}}, properties: {{}}}}]
Solution:
query: The graph contains no node for J.K. Rowling and none of her books; her bibliography must be gathered first.
query_type: INSERT
</example_insert>
</examples>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<tool_calls_already_made>
{tool_calls_made}
</tool_calls_already_made>
";

pub const WRITE_QUERIES_FROM_NEW_INFO: &str = "
<task>
You are a problem solver tasked with updating an incomplete in-memory graph used as a knowledge graph. You have just acquired new information that needs to be integrated into the graph.
</task>

<instructions>
To update the graph with the newly acquired information, provide scripts that add or modify nodes, attributes, and relationships. Follow these guidelines:

1. *Use Provided New Information Only*: Do not invent nor assume information; use only the provided new information. Add ALL the new relevant information that addresses the initial problem or brings us closer to the solution (e.g. new file paths of files that can be inspected later). If no new nor relevant information is given, do NOT return any script.
2. *No Calculations*: Do not perform any calculations with the provided values; add the raw numbers as properties instead.
3. Avoid Duplicates: Check the existing data so no duplicate nodes or relationships are created. If something must be counted multiple times, add a 'counter' property and increment it.
4. Give every node a short unique id (e.g. \"A1\", \"B2\") and a meaningful label.
5. Do NOT define `result` in write scripts; writes return nothing.
6. Correct Syntax and Semantics: follow the documentation below accurately.
</instructions>
{code_documentation}
<example>
New information: J.K. Rowling wrote \"Harry Potter and the Chamber of Secrets\".
Script:
graph.add_node(\"A1\", \"Author\", #{{name: \"J.K. Rowling\"}});
graph.add_node(\"B2\", \"Book\", #{{title: \"Harry Potter and the Chamber of Secrets\"}});
graph.add_edge(\"A1\", \"B2\", \"wrote\");
</example>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<new_information>
{new_information}
</new_information>

<missing_information>
{missing_information}
</missing_information>
";

pub const DEFINE_RETRIEVE_QUERY: &str = "
<task>
You are a problem solver expert in querying an in-memory directed graph used as a knowledge graph. Your task is to solve a given problem by writing a correct retrieval script. You will be provided with the initial problem, the existing data, and a previous script that failed or returned an empty result. Your goal is to write a new script that returns the correct results.
</task>

<instructions>
1. Understand the initial problem, the problem nuances and the existing data.
2. Analyze the provided incorrect script to identify why it failed or returned nothing.
3. Write a new script that retrieves the necessary data and stores it in `result`.
</instructions>
{code_documentation}
<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>

<wrong_query>
{wrong_query}
</wrong_query>
";

pub const FORCED_RETRIEVE_QUERY: &str = "
<task>
You are a problem solver expert in querying an in-memory directed graph used as a knowledge graph. The iteration budget is exhausted: you MUST now produce a retrieval script that extracts the best available answer to the initial problem from the data currently in the graph.
</task>

<instructions>
1. Understand the initial problem and ALL the existing data.
2. Write a script that stores the data most relevant to the problem in `result`, even if it only supports a partial answer.
3. Prefer broad matches over empty results.
</instructions>
{code_documentation}
<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>
";

pub const FIX_QUERY: &str = "
<task>
You are an expert in the graph scripting language documented below. A script failed to execute; your task is to repair it.
</task>

<instructions>
1. Read the failed script, the error log and the current graph content below.
2. Return a corrected script that preserves the intent of the original while fixing the reported error.
3. A RETRIEVE script must still set the `result` variable.
</instructions>
{code_documentation}
<existing_data>
{existing_entities_and_relationships}
</existing_data>

<query_to_fix>
{query_to_fix}
</query_to_fix>

<error_log>
{error_log}
</error_log>
";

/// Interpolate the shared code-documentation block into a template
/// pattern at library-construction time.
pub fn with_code_documentation(pattern: &'static str) -> String {
    pattern.replace("{code_documentation}", CODE_DOCUMENTATION)
}
