//! Cypher-dialect templates (labeled-property backend).

pub const DEFINE_NEXT_STEP: &str = "
<task>
You are a problem solver using a labeled-property graph database as a knowledge graph to solve a given problem. Note that the graph may be incomplete.
</task>

<instructions>
Understand the initial problem, the problem nuances, *ALL the existing data* in the graph database and the tools already called.
Can you solve the initial problem using the existing data in the graph database?
- If you can solve the initial problem with the existing data, return a Cypher query that retrieves the necessary data and set query_type to RETRIEVE. You can use ALL Cypher functionalities. Watch out for the correct syntax and semantics, and for the conditions and relationships the initial problem requires. Retrieve only if the data is sufficient to solve the problem in a zero-shot manner.
- If the existing data is insufficient to solve the problem, return why you could not solve the initial problem and what is missing, and set query_type to INSERT.
- Do NOT make up data. Do NOT assume anything. If you are missing a piece of information, choose to INSERT.
- If you only have partial information (e.g. calculations are still needed), continue to INSERT more data.
</instructions>

<examples>
<example_retrieve>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing entities: Author: [{{name: \"J.K. Rowling\", author_id: \"A1\"}}], Book: [{{title: \"Harry Potter and the Philosopher's Stone\", book_id: \"B1\"}}]
Existing relationships: (A1)-[:WROTE]->(B1)
Solution:
query:
MATCH (a:Author {{name: \"J.K. Rowling\"}})-[:WROTE]->(b:Book)
RETURN b.title AS book_title
query_type: RETRIEVE
</example_retrieve>
<example_insert>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing entities: Author: [{{name: \"George R.R. Martin\", author_id: \"A2\"}}]
Existing relationships: (A2)-[:WROTE]->(B3)
Solution:
query: The graph contains no J.K. Rowling author node and none of her books; her bibliography must be gathered first.
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
You are a problem solver tasked with updating an incomplete labeled-property graph used as a knowledge graph. You have just acquired new information that needs to be integrated into the database.
</task>

<instructions>
To update the graph with the newly acquired information, provide Cypher queries that accurately add or modify nodes, attributes, and relationships. Follow these guidelines:

1. *Use Provided New Information Only*: Do not invent nor assume information; use only the provided new information. Add ALL the new relevant information that addresses the initial problem or brings us closer to the solution (e.g. new file paths of files that can be inspected later). If no new nor relevant information is given, do NOT return any query.
2. *No Calculations*: Do not perform any calculations with the provided values; add the raw numbers as attributes instead.
3. Avoid Duplicates: Consider the existing data so no duplicate nodes or relationships are created. If something must be counted multiple times, add a 'counter' attribute and increment it.
4. Combine Operations with WITH Clauses: Use aliases and the WITH clause to chain sequential operations and avoid ghost nodes. A query CANNOT start with a WITH clause.
5. Group Related Queries: Write related operations as a single continuous query.
6. Omit RETURN Statements.
7. Do not use element ids to filter or match nodes.
8. Merge Existing Nodes: When merging nodes, always MATCH them with existing ones if they already exist.
9. Correct Syntax and Semantics: Follow Cypher syntax accurately.
10. A relationship can only be between entities; neither attributes nor relationships can have relationships.
11. Properly escape single and double quotes.

Example query structure, returned as a SINGLE query:
MERGE (n:Label {{property: 'value'}}) WITH n MERGE (m:OtherLabel {{property: 'value'}}) WITH n, m CREATE (n)-[:RELATIONSHIP]->(m)
</instructions>

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
You are a problem solver expert in using a labeled-property graph database as a knowledge graph. Your task is to solve a given problem by generating a correct Cypher query. You will be provided with the initial problem, existing data in the database, and a previous incorrect Cypher query that returned an empty result. Your goal is to create a new Cypher query that returns the correct results.
</task>

<instructions>
1. Understand the initial problem, the problem nuances and the existing data in the database.
2. Analyze the provided incorrect query to identify why it returned an empty result.
3. Write a new Cypher query to retrieve the necessary data. You can use ALL Cypher functionalities.
4. Ensure the new query is accurate and follows correct Cypher syntax and semantics.
</instructions>

<examples>
<example_retrieve_1>
Initial problem: Retrieve all books written by \"J.K. Rowling\".
Existing entities: Author: [{{name: \"J.K. Rowling\", author_id: \"A1\"}}, {{name: \"George R.R. Martin\", author_id: \"A2\"}}], Book: [{{title: \"Harry Potter and the Philosopher's Stone\", book_id: \"B1\"}}, {{title: \"Harry Potter and the Chamber of Secrets\", book_id: \"B2\"}}, {{title: \"A Game of Thrones\", book_id: \"B3\"}}]
Existing relationships: (A1)-[:WROTE]->(B1), (A1)-[:WROTE]->(B2), (A2)-[:WROTE]->(B3)
Incorrect query:
MATCH (b:Book)-[:WROTE]->(a:Author {{name: \"J.K. Rowling\"}})
RETURN b.title AS book_title
Solution:
query:
MATCH (a:Author {{name: \"J.K. Rowling\"}})-[:WROTE]->(b:Book)
RETURN b.title AS book_title
</example_retrieve_1>
<example_retrieve_2>
Initial problem: List all colleagues of \"Bob\".
Existing entities: Employee: [{{name: \"Alice\", employee_id: \"E1\"}}, {{name: \"Bob\", employee_id: \"E2\"}}, {{name: \"Charlie\", employee_id: \"E3\"}}], Department: [{{name: \"HR\", department_id: \"D1\"}}, {{name: \"Engineering\", department_id: \"D2\"}}]
Existing relationships: (E1)-[:WORKS_IN]->(D1), (E2)-[:WORKS_IN]->(D1), (E3)-[:WORKS_IN]->(D2)
Incorrect query:
MATCH (e:Employee {{name: \"Bob\"}})-[:WORKS_IN]->(d:Department)<-[:WORKS_IN]-(colleague:Employee)
WHERE colleague.name <> \"Alice\"
RETURN colleague.name AS colleague_name
Solution:
query:
MATCH (e:Employee {{name: \"Bob\"}})-[:WORKS_IN]->(d:Department)<-[:WORKS_IN]-(colleague:Employee)
WHERE colleague.name <> \"Bob\"
RETURN colleague.name AS colleague_name
</example_retrieve_2>
</examples>

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
You are a problem solver expert in using a labeled-property graph database as a knowledge graph. The iteration budget is exhausted: you MUST now produce a Cypher query that extracts the best available answer to the initial problem from the data currently in the database.
</task>

<instructions>
1. Understand the initial problem and ALL the existing data.
2. Write a Cypher query that retrieves the data most relevant to the problem, even if it only supports a partial answer.
3. Prefer broad matches over empty results; follow correct Cypher syntax.
</instructions>

<initial_problem>
{initial_query}
</initial_problem>

<existing_data>
{existing_entities_and_relationships}
</existing_data>
";

pub const FIX_QUERY: &str = "
<task>
You are a Cypher expert. A query failed to execute; your task is to repair it.
</task>

<instructions>
1. Read the failed query and the error log below.
2. Return a corrected Cypher query that preserves the intent of the original while fixing the reported error.
3. Follow correct Cypher syntax and semantics; properly escape quotes.
</instructions>

<query_to_fix>
{query_to_fix}
</query_to_fix>

<error_log>
{error_log}
</error_log>
";
